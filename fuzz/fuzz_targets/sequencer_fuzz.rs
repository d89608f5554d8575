#![no_main]
use libfuzzer_sys::fuzz_target;
use pseudoroot::modules::sequencer::MountSequence;
use pseudoroot::ExportEntry;

fuzz_target!(|paths: Vec<String>| {
    let exports: Vec<_> = paths.iter().map(|p| ExportEntry::new("*", p.as_str())).collect();
    let mut sequence = MountSequence::new();
    for export in &exports {
        sequence.insert(export);
    }

    assert_eq!(sequence.len(), exports.len());
    let lengths: Vec<_> = sequence
        .records()
        .map(|r| r.export.path.as_os_str().len())
        .collect();
    assert!(lengths.windows(2).all(|w| w[0] <= w[1]));
});
