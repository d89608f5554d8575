use pseudoroot::modules::sequencer::MountSequence;
use pseudoroot::{ClientClass, ExportEntry, ExportRegistry};

// Prints the mount order for a handful of exports. No privileges needed.
fn main() {
    let registry = ExportRegistry::from_entries([
        ExportEntry::new("*", "/export/projects/alpha"),
        ExportEntry::new("*", "/export"),
        ExportEntry::new("backup.example.com", "/export/backup").with_class(ClientClass::Fqdn),
        ExportEntry::new("*", "/home"),
    ]);

    for record in MountSequence::from_registry(&registry) {
        println!(
            "{}: {} ({:?})",
            record.position,
            record.export.path.display(),
            record.export.class
        );
    }
}
