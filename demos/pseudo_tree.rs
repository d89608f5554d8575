mod common;

use anyhow::Result;
use pseudoroot::{
    Config, CreateStatus, ExportEntry, ExportRegistry, FsidType, PseudoRootManager,
};
use std::path::Path;

// Needs root: builds a real pseudo tree under /tmp and tears it down again.
fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Debug)
        .init();

    let base = Path::new("/tmp/pseudoroot-demo/exports");
    let exports = ["/srv", "/srv/home", "/data"];
    common::setup_exports(base, &exports)?;

    let registry = ExportRegistry::from_entries(
        exports
            .iter()
            .map(|e| ExportEntry::new("*", base.join(e.trim_start_matches('/')))),
    );

    let manager = PseudoRootManager::system(&Config::with_root("/tmp/pseudoroot-demo/v4root"));
    match manager.create(&registry) {
        CreateStatus::Built(report) => {
            for outcome in &report.outcomes {
                println!(
                    "{} -> {}: {}",
                    outcome.export_path.display(),
                    outcome.target.display(),
                    if outcome.result.is_ok() { "ok" } else { "failed" }
                );
            }
        }
        other => println!("Pseudo root not built: {:?}", other),
    }

    let pseudo = manager.pseudo();
    if let Some(export) = pseudo.chkroot(FsidType::Num, 0, None) {
        println!("Root export: {} ({:?})", export.path.display(), export.flags);
    }
    let inside = format!("/tmp/pseudoroot-demo/v4root{}/srv/home", base.display());
    println!("maproot({}) = {:?}", inside, pseudo.maproot(&inside));

    manager.umountall();
    Ok(())
}
