use crate::commands::StatusArgs;
use crate::manifest;
use anyhow::Result;
use bpkg_store::PackageStore;

pub fn run(args: &StatusArgs) -> Result<()> {
    let loaded = manifest::load(&args.config, &args.db)?;
    for config in &loaded.configs {
        let Some(handle) = loaded.graph.get(*config) else { continue };
        println!("{} ({:?}) at {}", config.raw(), handle.config_type(), handle.path().display());
    }

    for sel in &loaded.selections {
        let persisted = loaded.store.find_selected(&sel.key);
        match persisted {
            Some(current) if current.version == sel.available.version => {
                println!("  {} up to date at {}", sel.key, current.version);
            }
            Some(current) => {
                println!("  {} {} -> {}", sel.key, current.version, sel.available.version);
            }
            None => {
                println!("  {} new at {}", sel.key, sel.available.version);
            }
        }
    }
    Ok(())
}
