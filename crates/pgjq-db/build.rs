//! Build script so `sqlx::migrate!` picks up new migration files.

fn main() {
    // Rerun if migrations change
    println!("cargo:rerun-if-changed=migrations/");
}
