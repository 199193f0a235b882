use proptest::prelude::*;

use crate::chart_type::ChartTypeRecord;
use crate::hierarchy::BuildOptions;
use crate::range::RangeDescriptor;
use crate::records::{
    BiffRecordIter, RECORD_AXISPARENT, RECORD_BAR, RECORD_BEGIN, RECORD_CHART,
    RECORD_CHARTFORMAT, RECORD_END, RECORD_FRAME, RECORD_SERIES, RECORD_SERIESLIST,
    RECORD_SERTOCRT, RECORD_UNITS,
};
use crate::scale::{self, ValueRange};
use crate::strings::SeriesText;
use crate::{parse_chart, ptg, serialize, serialize_to_bytes, ChartKind, ChartTree};

const MAX_INPUT_LEN: usize = 16 * 1024;
const CODEPAGE_1252: u16 = 1252;

fn record(out: &mut Vec<u8>, id: u16, payload: &[u8]) {
    out.extend_from_slice(&id.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    out.extend_from_slice(payload);
}

/// A chart with `series` series and `groups` chart-type groups; group 0 carries no
/// `SERIESLIST`, so every series starts in it.
fn chart_with_groups(series: usize, groups: usize) -> Vec<u8> {
    let mut out = Vec::new();
    record(&mut out, RECORD_CHART, &[0; 16]);
    record(&mut out, RECORD_BEGIN, &[]);
    for _ in 0..series {
        record(&mut out, RECORD_SERIES, &[1, 0, 1, 0, 4, 0, 4, 0, 1, 0, 0, 0]);
        record(&mut out, RECORD_BEGIN, &[]);
        record(&mut out, RECORD_SERTOCRT, &[0, 0]);
        record(&mut out, RECORD_END, &[]);
    }
    record(&mut out, RECORD_AXISPARENT, &[0; 18]);
    record(&mut out, RECORD_BEGIN, &[]);
    for _ in 0..groups {
        record(&mut out, RECORD_CHARTFORMAT, &[0; 20]);
        record(&mut out, RECORD_BEGIN, &[]);
        record(&mut out, RECORD_BAR, &[0, 0, 150, 0, 0, 0]);
        record(&mut out, RECORD_END, &[]);
    }
    record(&mut out, RECORD_END, &[]);
    record(&mut out, RECORD_END, &[]);
    out
}

/// Balanced chart from a sequence of nesting steps: 0 opens a FRAME block, 1 closes the
/// innermost open block, anything else writes a leaf record.
fn nested_chart(steps: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    record(&mut out, RECORD_CHART, &[0; 16]);
    record(&mut out, RECORD_BEGIN, &[]);
    let mut depth = 0usize;
    for &step in steps {
        match step {
            0 if depth < 16 => {
                record(&mut out, RECORD_FRAME, &[0, 0, 3, 0]);
                record(&mut out, RECORD_BEGIN, &[]);
                depth += 1;
            }
            1 if depth > 0 => {
                record(&mut out, RECORD_END, &[]);
                depth -= 1;
            }
            _ => record(&mut out, RECORD_UNITS, &[0, 0]),
        }
    }
    for _ in 0..depth {
        record(&mut out, RECORD_END, &[]);
    }
    record(&mut out, RECORD_END, &[]);
    out
}

fn build(bytes: &[u8]) -> ChartTree {
    parse_chart(bytes, &BuildOptions::default()).expect("generated chart is well formed")
}

fn arb_chart_kind() -> impl Strategy<Value = ChartKind> {
    prop_oneof![
        Just(ChartKind::Column),
        Just(ChartKind::Bar),
        Just(ChartKind::Line),
        Just(ChartKind::Area),
        Just(ChartKind::Scatter),
        Just(ChartKind::Radar),
        Just(ChartKind::Pie),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        rng_seed: proptest::test_runner::RngSeed::Fixed(0),
        failure_persistence: None,
        .. ProptestConfig::default()
    })]

    #[test]
    fn chart_builder_is_panic_free_and_clean_output_matches_input(
        buf in proptest::collection::vec(any::<u8>(), 0..=MAX_INPUT_LEN)
    ) {
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            parse_chart(&buf, &BuildOptions::default())
        }));
        prop_assert!(outcome.is_ok(), "chart builder panicked");

        if let Ok(Ok(mut tree)) = outcome {
            let consumed = tree.bytes_consumed();
            prop_assert!(consumed <= buf.len());
            let bytes = serialize_to_bytes(&mut tree).expect("records came from a valid stream");
            prop_assert_eq!(bytes.as_slice(), &buf[..consumed]);
        }
    }

    #[test]
    fn structured_chart_streams_are_panic_free(
        ids in proptest::collection::vec(
            prop_oneof![
                Just(RECORD_BEGIN),
                Just(RECORD_END),
                Just(RECORD_SERIES),
                Just(RECORD_CHARTFORMAT),
                Just(RECORD_SERIESLIST),
                Just(crate::records::RECORD_AI),
                Just(crate::records::RECORD_SERIESTEXT),
                Just(crate::records::RECORD_VALUERANGE),
                Just(RECORD_BAR),
            ],
            0..64,
        ),
        payloads in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..24), 64),
    ) {
        let mut bytes = Vec::new();
        record(&mut bytes, RECORD_CHART, &[]);
        record(&mut bytes, RECORD_BEGIN, &[]);
        for (id, payload) in ids.iter().zip(&payloads) {
            record(&mut bytes, *id, payload);
        }
        record(&mut bytes, RECORD_END, &[]);

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            parse_chart(&bytes, &BuildOptions::default()).map(|mut tree| {
                tree.mark_dirty();
                serialize(&mut tree)
            })
        }));
        prop_assert!(outcome.is_ok(), "chart builder or serializer panicked");
    }

    #[test]
    fn record_payload_parsers_are_panic_free(data in proptest::collection::vec(any::<u8>(), 0..256)) {
        let outcome = std::panic::catch_unwind(|| {
            let _ = RangeDescriptor::parse(&data, None);
            let _ = SeriesText::parse(&data, CODEPAGE_1252);
            let _ = ValueRange::parse(&data);
            for id in 0x1017u16..=0x101B {
                let _ = ChartTypeRecord::parse(id, &data);
            }
            BiffRecordIter::new(&data).count()
        });
        prop_assert!(outcome.is_ok());
    }

    #[test]
    fn parsed_range_payload_is_preserved(data in proptest::collection::vec(any::<u8>(), 8..128)) {
        if let Ok(range) = RangeDescriptor::parse(&data, None) {
            prop_assert_eq!(range.to_bytes(), data);
        }
    }

    #[test]
    fn expression_tokens_reencode_to_input(rgce in proptest::collection::vec(any::<u8>(), 0..96)) {
        let tokens = ptg::parse(&rgce);
        prop_assert_eq!(ptg::serialize(&tokens), rgce);
    }

    #[test]
    fn generated_nestings_match_their_brackets(steps in proptest::collection::vec(0u8..3, 0..96)) {
        let bytes = nested_chart(&steps);
        let mut tree = build(&bytes);
        prop_assert_eq!(tree.bytes_consumed(), bytes.len());
        prop_assert_eq!(tree.root().record_count(), tree.original_records().len());

        tree.mark_dirty();
        prop_assert_eq!(serialize_to_bytes(&mut tree).expect("encodable"), bytes);
    }

    #[test]
    fn membership_survives_serialization(
        groups in 1usize..4,
        assignment in proptest::collection::vec(0usize..4, 1..8),
    ) {
        let bytes = chart_with_groups(assignment.len(), groups);
        let mut tree = build(&bytes);
        let wanted: Vec<usize> = assignment.iter().map(|g| g % groups).collect();
        for (series, &group) in wanted.iter().enumerate() {
            tree.assign_series_to_group(series, group).expect("group exists");
        }

        let reparsed = build(&serialize_to_bytes(&mut tree).expect("encodable"));
        prop_assert_eq!(reparsed.membership(), wanted.as_slice());
        prop_assert_eq!(reparsed.groups().len(), groups);
    }

    #[test]
    fn auto_scale_covers_the_data(
        a in -1_000_000i32..1_000_000,
        b in -1_000_000i32..1_000_000,
        kind in arb_chart_kind(),
    ) {
        let (lo, hi) = (f64::from(a.min(b)), f64::from(a.max(b)));
        let scale = scale::compute(lo, hi, kind);
        prop_assert!(scale.min <= lo, "{scale:?} does not reach {lo}");
        prop_assert!(scale.max >= hi, "{scale:?} does not reach {hi}");
        prop_assert!(scale.major > 0.0);
        prop_assert!(scale.minor > 0.0 && scale.minor <= scale.major);
    }
}
