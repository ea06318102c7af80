//! Cortex-M register probes for `MTPort` implementations.
//!
//! These back the default `MTPort::is_isr` and `MTPort::is_critical`.
//! Off target they report thread mode with interrupts enabled.

/// Returns `true` while an exception handler is active (`ICSR.VECTACTIVE` non-zero).
pub fn in_handler_mode() -> bool
{
    #[cfg(target_arch = "arm")]
    {
        use cortex_m::peripheral::scb::VectActive;

        cortex_m::peripheral::SCB::vect_active() != VectActive::ThreadMode
    }
    #[cfg(not(target_arch = "arm"))]
    {
        false
    }
}

/// Returns `true` if interrupts are masked by PRIMASK, or by BASEPRI on ARMv7-M.
pub fn irq_masked() -> bool
{
    #[cfg(target_arch = "arm")]
    {
        if cortex_m::register::primask::read().is_inactive() {
            return true;
        }

        #[cfg(mtosal_basepri)]
        {
            if cortex_m::register::basepri::read() != 0 {
                return true;
            }
        }

        false
    }
    #[cfg(not(target_arch = "arm"))]
    {
        false
    }
}

#[doc(hidden)]
pub fn halt() -> !
{
    #[cfg(target_arch = "arm")]
    {
        cortex_m::interrupt::disable();

        loop {
            cortex_m::asm::bkpt();
        }
    }
    #[cfg(not(target_arch = "arm"))]
    {
        loop {
            core::hint::spin_loop();
        }
    }
}
