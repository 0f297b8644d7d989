#![allow(dead_code)]

pub use livehls_test_utils::builders;
pub use livehls_test_utils::fakes;
pub use livehls_test_utils::{init_tracing, wait_until, with_timeout};
