/// Ensures that the enclosing function is only run once.
/// Panics if run more than once.
#[macro_export]
macro_rules! call_once {
    () => {{
        use core::sync::atomic::{AtomicBool, Ordering};
        static ALREADY_INVOKED: AtomicBool = AtomicBool::new(false);
        assert!(
            !ALREADY_INVOKED.swap(true, Ordering::Relaxed),
            "this path must only run once"
        );
    }};
}
