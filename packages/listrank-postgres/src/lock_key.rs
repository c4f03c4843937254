use blake3::Hasher;

use listrank_core::{ListTable, ScopeCondition, Value};

const SCOPE_LOCK_DOMAIN: &[u8] = b"listrank/scope_lock/v0";

fn update_len_prefixed(hasher: &mut Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u32).to_be_bytes());
    hasher.update(bytes);
}

fn update_value(hasher: &mut Hasher, value: &Value) {
    match value {
        Value::Null => {
            hasher.update(&[0]);
        }
        Value::Bool(b) => {
            hasher.update(&[1, u8::from(*b)]);
        }
        Value::Int(i) => {
            hasher.update(&[2]);
            hasher.update(&i.to_be_bytes());
        }
        Value::Text(s) => {
            hasher.update(&[3]);
            update_len_prefixed(hasher, s.as_bytes());
        }
    }
}

/// Advisory lock key for one scope of one list: the first 8 bytes of a domain-separated
/// blake3 hash over the table, position column and scope terms.
pub fn scope_lock_key(table: &ListTable, scope: &ScopeCondition) -> i64 {
    let mut hasher = Hasher::new();
    hasher.update(SCOPE_LOCK_DOMAIN);
    update_len_prefixed(&mut hasher, table.table.as_bytes());
    update_len_prefixed(&mut hasher, table.column.as_bytes());
    hasher.update(&(scope.terms().len() as u32).to_be_bytes());
    for (column, value) in scope.terms() {
        update_len_prefixed(&mut hasher, column.as_bytes());
        update_value(&mut hasher, value);
    }
    let hash = hasher.finalize();
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash.as_bytes()[0..8]);
    i64::from_be_bytes(out)
}
