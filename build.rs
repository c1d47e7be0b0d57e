// Copyright 2023 Remi Bernotavicius

// The migrations are embedded into the binary, so changes to them need to trigger a rebuild.
fn main() {
    println!("cargo:rerun-if-changed=migrations/");
}
