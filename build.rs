fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // ESP-IDF link arguments are only needed for firmware builds; host test
    // builds compile without embuild.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
