use std::env;
use std::fs;
use std::path::Path;

fn main() {
    println!("cargo:rerun-if-changed=config.toml");

    // Get the output directory from cargo
    let out_dir = env::var("OUT_DIR").unwrap();

    // Copy config.toml next to the built binary (target/<profile>/)
    let config_path = Path::new("config.toml");
    if !config_path.exists() {
        return;
    }
    let dest_path = Path::new(&out_dir)
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("config.toml");

    fs::copy(config_path, dest_path).unwrap();
}
