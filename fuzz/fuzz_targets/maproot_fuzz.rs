#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pseudoroot::modules::pseudo::PseudoRoot;

#[derive(Arbitrary, Debug)]
struct Input {
    root: String,
    path: String,
}

fuzz_target!(|input: Input| {
    let pseudo = PseudoRoot::new(&input.root);
    assert!(pseudo.maproot(&input.path).is_none());

    pseudo.publish();
    if let Some(mapped) = pseudo.maproot(&input.path) {
        // A mapped path is either the root itself or an absolute suffix of
        // the input.
        assert!(mapped.starts_with('/') || input.path == mapped);
        assert!(input.path.ends_with(&mapped));
    }
});
