#![deny(warnings)]

use persistence::{default_store_path, JsonFileStore, KvStore, SCHEMA_VERSION, SCHEMA_VERSION_KEY};

fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| default_store_path().to_string());
    let mut store = JsonFileStore::open(&path)?;
    if store.get(SCHEMA_VERSION_KEY)?.is_none() {
        store.put(SCHEMA_VERSION_KEY, SCHEMA_VERSION.to_string())?;
    }
    println!(
        "store ready at {} ({} keys)",
        store.path().display(),
        store.keys()?.len()
    );
    Ok(())
}
