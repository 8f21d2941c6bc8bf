fn main() {
    // The ESP-IDF environment only exists when cross-compiling; host builds
    // (tests, simulation) skip it.
    #[cfg(feature = "espidf")]
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::espidf::sysenv::output();
    }
}
