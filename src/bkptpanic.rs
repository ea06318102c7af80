#[doc(hidden)]
#[macro_export]
macro_rules! bk_panic {
    ($($arg:tt)*) => ({
        if cfg!(debug_assertions) {
            panic!($($arg)*);
        }
        else {
            $crate::cortex::halt()
        }
    });
}

#[doc(hidden)]
#[macro_export]
macro_rules! mt_dbg_check {
    ($cond:expr, $msg:expr) => ({
        if cfg!(any(debug_assertions, feature = "dbg-checks")) {
            if !$cond {
                log::error!("osal contract violation: {}", $msg);
                $crate::bk_panic!("{}", $msg);
            }
        }
    });
}

/// Class I: the critical section is held, interrupt context allowed.
#[doc(hidden)]
#[macro_export]
macro_rules! mt_dbg_check_class_i {
    ($p:ty) => ({
        $crate::mt_dbg_check!(<$p as $crate::MTPort>::is_critical(), "not in critical section");
    });
}

/// Class S: the critical section is held from thread context.
#[doc(hidden)]
#[macro_export]
macro_rules! mt_dbg_check_class_s {
    ($p:ty) => ({
        $crate::mt_dbg_check_class_i!($p);
        $crate::mt_dbg_check!(!<$p as $crate::MTPort>::is_isr(), "in interrupt");
    });
}
