// build.rs

fn main() {
    // --- Link against X11 and its dependencies ---
    // pkg-config first; if it is missing or a .pc file is absent, fall back
    // to plain linker flags for the standard library locations.

    let libraries = ["x11", "xft", "xrender", "fontconfig"]; // Keyboard window drawing and label fonts

    let mut pkg_config_success = true;

    for lib in &libraries {
        if pkg_config::probe_library(lib).is_err() {
            eprintln!(
                "pkg-config failed for library '{}'. Falling back to manual linking.",
                lib
            );
            pkg_config_success = false;
            break;
        }
    }

    if !pkg_config_success {
        println!("cargo:rustc-link-lib=X11");
        println!("cargo:rustc-link-lib=Xft");
        println!("cargo:rustc-link-lib=Xrender");
        println!("cargo:rustc-link-lib=fontconfig");
        println!("cargo:rustc-link-search=/usr/lib");
        eprintln!(
            "Manual linking flags applied. Ensure X11, Xft, Xrender and Fontconfig development libraries are installed."
        );
    } else {
        eprintln!("pkg-config successfully found libraries. Linking configured automatically.");
    }
}
