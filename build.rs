use std::env;

fn main() {
    let target = env::var("TARGET").unwrap();

    println!("cargo:rustc-check-cfg=cfg(mtosal_basepri)");

    // BASEPRI exists on ARMv7-M only among the targets cortex-m exposes it for
    if target.starts_with("thumbv7m") || target.starts_with("thumbv7em") {
        println!("cargo:rustc-cfg=mtosal_basepri");
    }
}
