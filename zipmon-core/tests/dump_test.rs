// Integration tests for the annotated disassembly dump
#[cfg(test)]
mod tests {
    use zipmon_core::decoder::{Decoder, Mnemonic};
    use zipmon_core::image::{read_image, WordOrder};
    use zipmon_core::profile::dump::{AnnotatedDump, Counts};
    use zipmon_core::profile::report::write_dump;
    use zipmon_core::profile::{ProfileSample, ProfileTable};
    use zipmon_core::ZipDecoder;

    const NOOP: u32 = 0x4e00_0000;

    /// Decoder that prints the word in hex, for layout checks.
    struct HexDecoder;

    impl Decoder for HexDecoder {
        fn decode(&self, word: u32) -> Mnemonic {
            Mnemonic {
                primary: format!("W{word:x}"),
                alternate: None,
            }
        }
    }

    fn table() -> ProfileTable {
        ProfileTable::aggregate(&[
            ProfileSample::new(0x100, 5),
            ProfileSample::new(0x104, 3),
            ProfileSample::new(0x100, 2),
        ])
        .unwrap()
        .unwrap()
    }

    #[test]
    fn test_visits_every_address_once() {
        let words: Vec<u32> = (0..10).collect();
        let addresses: Vec<u32> = AnnotatedDump::new(words, 0x8000, HexDecoder, None)
            .map(|line| line.address)
            .collect();
        assert_eq!(addresses, (0x8000..0x800a).collect::<Vec<u32>>());
    }

    #[test]
    fn test_address_wraps_at_top_of_memory() {
        let addresses: Vec<u32> = AnnotatedDump::new(vec![1, 2, 3], u32::MAX - 1, HexDecoder, None)
            .map(|line| line.address)
            .collect();
        assert_eq!(addresses, vec![u32::MAX - 1, u32::MAX, 0]);
    }

    #[test]
    fn test_no_profile_has_no_count_columns() {
        let lines: Vec<String> = AnnotatedDump::new(vec![NOOP], 0x100, ZipDecoder::new(), None)
            .map(|line| line.to_string())
            .collect();
        assert_eq!(lines, vec!["00000100: (0x4e000000 N...) NOOP"]);
    }

    #[test]
    fn test_counts_inside_and_outside_profile_range() {
        let table = table();
        let dump = AnnotatedDump::new(vec![NOOP; 8], 0xfe, ZipDecoder::new(), Some(&table));
        let lines: Vec<_> = dump.collect();

        assert_eq!(lines[0].counts, Counts::OutOfRange);
        assert_eq!(lines[2].counts, Counts::Sampled { hits: 2, cycles: 7 });
        assert_eq!(lines[4].counts, Counts::Sampled { hits: 0, cycles: 0 });
        assert_eq!(lines[7].counts, Counts::OutOfRange);

        assert_eq!(
            lines[0].to_string(),
            format!("000000fe: (0x4e000000 N...) {}NOOP", " ".repeat(18))
        );
        assert_eq!(
            lines[2].to_string(),
            "00000100: (0x4e000000 N...)        2        7 NOOP"
        );
        assert_eq!(
            lines[4].to_string(),
            "00000102: (0x4e000000 N...)        0        0 NOOP"
        );
    }

    #[test]
    fn test_alias_prints_alternate_line() {
        let lines: Vec<String> = AnnotatedDump::new(vec![0x2f0f_7fff], 0x8000, ZipDecoder::new(), None)
            .map(|line| line.to_string())
            .collect();
        assert_eq!(
            lines,
            vec![format!(
                "00008000: (0x2f0f7fff /...) BRA     $-1\n{}MOV     $-1+PC,PC",
                " ".repeat(26)
            )]
        );
    }

    #[test]
    fn test_write_dump_from_image_bytes() {
        let bytes = [0x00, 0x00, 0x00, 0x4e, 0x44, 0x43, 0x42, 0x41, 0x01];
        let words = read_image(&bytes[..], WordOrder::Little).unwrap();
        let mut out = Vec::new();
        let count = write_dump(
            &mut out,
            "prog.bin",
            AnnotatedDump::new(words, 0x20, HexDecoder, None),
        )
        .unwrap();

        assert_eq!(count, 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "prog.bin:\n\
             00000020: (0x4e000000 N...) W4e000000\n\
             00000021: (0x41424344 ABCD) W41424344\n"
        );
    }
}
