use listrank_test_support::{conformance_suite, MemoryMixins};

conformance_suite!(MemoryMixins::setup);
