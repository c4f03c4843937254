//! Shared test support for listrank backends: the `mixins` test entity, a host persistence
//! shim, and the conformance suite every `ListStore` implementation runs.

mod memory;
mod mixin;
mod recording;
pub mod suite;

pub use memory::MemoryMixins;
pub use mixin::{
    create, destroy, find, mixin_list, order, positions, save, schema, Mixin, MixinScope,
    MixinTable,
};
pub use recording::Recording;

use std::sync::Once;

/// Install a `RUST_LOG`-filtered subscriber that writes through the test harness.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Generate one `#[test]` per conformance check.
///
/// `$setup` is a function returning `Option<(store, table)>` for a fresh, empty `mixins`
/// table; `None` skips the test (e.g. no database configured).
#[macro_export]
macro_rules! conformance_suite {
    ($setup:path) => {
        $crate::conformance_suite!(@tests $setup;
            reordering,
            bounds_checking,
            move_to_bottom_from_next_to_last,
            next_and_previous,
            scope_condition_and_column,
            insert,
            insert_at,
            insert_at_clamps_to_bounds,
            delete_middle,
            nil_scope,
            remove_from_list_leaves_the_list,
            remove_from_list_nulls_position,
            remove_then_destroy_shifts_once,
            rescope_shifts_old_list_and_appends,
            save_without_scope_change_is_a_noop,
            before_destroy_keeps_own_position,
            higher_and_lower_items,
            moving_first_and_last_items_returns_true,
            append_returns_true,
            decrement_returns_true,
            template_scope,
            template_scope_rescope,
            parent_and_type_scope,
            association_scope,
            polymorphic_association_scope,
            writes_only_changed_rows,
            repairs_stale_gaps,
            unsaved_items_are_not_placed,
            offsets_past_the_position_range_find_nothing,
            empty_scope_queries,
            host_failure_rolls_back_list_changes,
            savepoint_rollback_keeps_outer_work,
        );
    };
    (@tests $setup:path; $($name:ident),+ $(,)?) => {
        $(
            #[test]
            fn $name() {
                $crate::init_tracing();
                let Some((mut store, table)) = $setup() else {
                    return;
                };
                $crate::suite::$name(&mut store, &table);
            }
        )+
    };
}
