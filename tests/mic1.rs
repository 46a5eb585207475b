use micasm::{assemble, compile_named};
use pretty_assertions::assert_eq;

const MIC1: &str = include_str!("../demos/mic1.mal");

#[test]
fn sample_microprogram_assembles() {
    let output = compile_named(MIC1, "mic1.mal");
    assert!(output.is_ok(), "{:?}", output.errors);
    assert_eq!(output.words.len(), 83);

    #[rustfmt::skip]
    let known = [
        (0,  0x00C0_0000),
        (1,  0x0050_6000),
        (2,  0xB013_001C),
        (3,  0x2414_3313),
        (4,  0x2414_040B),
        (8,  0xF011_0000),
        (9,  0x11A0_3100),
        (17, 0x981A_0000),
        (19, 0x2414_0419),
        (22, 0x6810_8300),
        (24, 0x6000_0000),
        (47, 0x0012_7200),
        (56, 0x00D2_2600),
        (78, 0x181A_0A00),
        (79, 0x601A_6A4B),
        (80, 0xFFFF_FFFF),
        (81, 0x101A_0600),
        (82, 0xFFFF_FFFF),
    ];

    for (address, word) in known {
        assert_eq!(
            (address, output.words[address]),
            (address, word),
            "word at {} differs",
            address
        );
    }
}

#[test]
fn numeric_labels_match_addresses() {
    let assembly = assemble(MIC1, "mic1.mal").expect("sample failed to assemble");

    assert_eq!(assembly.labels.len(), 83);
    for (label, address) in assembly.labels.iter() {
        assert_eq!(label.to_string(), address.to_string());
    }
}

#[test]
fn every_branch_targets_a_program_address() {
    let output = compile_named(MIC1, "mic1.mal");

    for word in output.control_words() {
        let fields = word.fields();
        if fields.cond != 0 && word.bits() != u32::MAX {
            assert!((fields.addr as usize) < output.words.len());
        }
    }
}
