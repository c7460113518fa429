//! State totals, per-draw retention, and state-level rates.

mod common;

use common::{assert_close, random_blocks, write_blocks, write_long, Scratch};
use drawsum_core::{
    demographic::{DatasetKind, Demographic},
    error::SummaryError,
    geo::GeoMapper,
    loader::DrawLoader,
    rate::RateCombiner,
    state::{StateAggregator, StateSums},
    summary::GroupKey,
    table::RegionSet,
};
use std::collections::{BTreeMap, BTreeSet};

const AGE: Option<Demographic> = Some(Demographic::Age);

/// Counties 1, 3 in "AA"; 2, 4 in "BB"; 5 in "CC".
fn geo() -> GeoMapper {
    GeoMapper::from_rows(vec![
        ("00001", "AA"),
        ("00002", "BB"),
        ("00003", "AA"),
        ("00004", "BB"),
        ("00005", "CC"),
    ])
}

fn sums(state: &str, cells: &[(&str, Vec<f64>)]) -> StateSums {
    StateSums {
        state:        state.to_string(),
        per_category: cells
            .iter()
            .map(|(c, draws)| (Some(c.to_string()), draws.clone()))
            .collect(),
    }
}

#[test]
fn reassignment_yields_dense_draws_per_cell() {
    let dir = Scratch::new("dense-draws");
    let blocks = random_blocks(11, 4, &["x", "y", "z"], 3, 7, 10);
    let paths = write_blocks(&dir.path, "blk_", "age", "msm_count", &blocks);

    let loader = DrawLoader::new(3).unwrap();
    let region = RegionSet::Members(BTreeSet::from([1, 2, 4]));
    let (mut table, _) = loader.load_long(&paths, DatasetKind::Numerator, AGE, &region);
    table.reassign_draw_indices();

    // R = 3 counties, M = 3 categories, D = 3 blocks x 7 draws.
    assert_eq!(table.len(), 3 * 3 * 21);
    let mut draws: BTreeMap<(Option<String>, u32), BTreeSet<u32>> = BTreeMap::new();
    for row in table.rows() {
        draws.entry((row.category.clone(), row.county)).or_default().insert(row.draw);
    }
    assert_eq!(draws.len(), 9);
    let expected: BTreeSet<u32> = (1..=21).collect();
    for (cell, set) in &draws {
        assert_eq!(set, &expected, "cell {cell:?} is not dense");
    }
    assert_eq!(table.irregular_cells(Some(21)), 0);
}

#[test]
fn state_totals_sum_member_counties_per_draw() {
    let dir = Scratch::new("state-sums");
    let msm = dir.join("adj_msm_age_blk_1.csv");
    write_long(&msm, "age", "msm_count", &[
        ("a", 1, 1, 1.0), ("a", 1, 2, 2.0),
        ("a", 2, 1, 100.0), ("a", 2, 2, 100.0),
        ("a", 3, 1, 10.0), ("a", 3, 2, -4.0),
        ("b", 1, 1, 7.0), ("b", 1, 2, 7.0),
        ("b", 3, 1, 1.0), ("b", 3, 2, 1.0),
    ]);

    let geo = geo();
    let loader = DrawLoader::new(2).unwrap();
    let out = StateAggregator::new(&loader, &geo, AGE).run(&[msm], None).unwrap();

    let aa = out.numerator_sums.iter().find(|s| s.state == "AA").unwrap();
    assert_eq!(aa.per_category[&Some("a".to_string())], vec![11.0, 2.0], "-4 clamps to 0");
    assert_eq!(aa.per_category[&Some("b".to_string())], vec![8.0, 8.0]);

    let keys: Vec<GroupKey> = out.summaries.iter().map(|r| r.key.clone()).collect();
    assert_eq!(keys, vec![
        GroupKey::state("AA").with_demographic("a"),
        GroupKey::state("AA").with_demographic("b"),
        GroupKey::state("BB").with_demographic("a"),
    ]);
    assert_eq!(out.summaries[0].stats.median, 6.5);
    assert_eq!(out.quality.skipped_states, 1, "CC has no rows");
    assert_eq!(out.quality.clamped_values, 1);
}

#[test]
fn denominator_uses_its_own_demographic_column() {
    let dir = Scratch::new("state-columns");
    let msm = dir.join("msm.csv");
    write_long(&msm, "age", "msm_count", &[("a", 1, 1, 10.0), ("a", 1, 2, 20.0), ("a", 1, 3, 30.0)]);
    let male = dir.join("male.csv");
    write_long(&male, "age_group", "male_pop", &[("a", 1, 1, 100.0), ("a", 1, 2, 200.0), ("a", 1, 3, 150.0)]);

    let geo = GeoMapper::from_rows(vec![("00001", "AA")]);
    let loader = DrawLoader::new(2).unwrap();
    let out = StateAggregator::new(&loader, &geo, AGE)
        .run(&[msm], Some(&[male][..]))
        .unwrap();
    assert_eq!(out.denominator_sums.len(), 1);
    assert_eq!(out.denominator_sums[0].per_category[&Some("a".to_string())], vec![100.0, 200.0, 150.0]);

    let (rates, non_finite) = RateCombiner::new("msm/male age")
        .combine(&out.numerator_sums, &out.denominator_sums)
        .unwrap();
    assert_eq!(non_finite, 0);
    assert_eq!(rates.len(), 1);
    let s = rates[0].stats;
    assert_close(s.mean, 0.4 / 3.0, "mean");
    assert_close(s.median, 0.1, "median");
    assert_close(s.q025, 0.1, "q025");
    assert_close(s.q975, 0.195, "q975");
}

#[test]
fn rate_summaries_are_grouped_by_state_then_category() {
    let numerator = vec![
        sums("BB", &[("y", vec![1.0, 2.0]), ("x", vec![3.0, 4.0])]),
        sums("AA", &[("x", vec![1.0, 1.0])]),
    ];
    let denominator = vec![
        sums("AA", &[("x", vec![2.0, 4.0])]),
        sums("BB", &[("x", vec![6.0, 8.0]), ("y", vec![4.0, 4.0])]),
    ];
    let (rows, _) = RateCombiner::new("test").combine(&numerator, &denominator).unwrap();
    let keys: Vec<_> = rows.iter().map(|r| r.key.clone()).collect();
    assert_eq!(keys, vec![
        GroupKey::state("AA").with_demographic("x"),
        GroupKey::state("BB").with_demographic("x"),
        GroupKey::state("BB").with_demographic("y"),
    ]);
    assert_close(rows[0].stats.mean, 0.375, "AA/x mean of 0.5 and 0.25");
}

#[test]
fn mismatched_draw_counts_are_fatal() {
    let numerator = vec![sums("AA", &[("x", vec![1.0, 2.0, 3.0])])];
    let denominator = vec![sums("AA", &[("x", vec![1.0, 2.0])])];
    match RateCombiner::new("msm/male age").combine(&numerator, &denominator) {
        Err(SummaryError::Alignment { dataset, state, demographic, details }) => {
            assert_eq!(dataset, "msm/male age");
            assert_eq!(state, "AA");
            assert_eq!(demographic, "x");
            assert!(details.contains("3 draws"), "details: {details}");
        }
        other => panic!("expected Alignment error, got {other:?}"),
    }
}

#[test]
fn one_sided_categories_and_states_are_fatal() {
    let numerator = vec![sums("AA", &[("x", vec![1.0])])];

    let extra_category = vec![sums("AA", &[("x", vec![1.0]), ("y", vec![1.0])])];
    assert!(matches!(
        RateCombiner::new("t").combine(&numerator, &extra_category),
        Err(SummaryError::Alignment { .. })
    ));

    let other_category = vec![sums("AA", &[("y", vec![1.0])])];
    assert!(matches!(
        RateCombiner::new("t").combine(&numerator, &other_category),
        Err(SummaryError::Alignment { .. })
    ));

    assert!(matches!(
        RateCombiner::new("t").combine(&numerator, &[]),
        Err(SummaryError::Alignment { .. })
    ));
}

#[test]
fn state_rates_do_not_depend_on_file_order() {
    let dir = Scratch::new("file-order-rates");
    let msm = random_blocks(21, 5, &["a", "b"], 4, 9, 40);
    let male = random_blocks(22, 5, &["a", "b"], 4, 9, 400);
    let msm_paths = write_blocks(&dir.path, "adj_msm_age_blk_", "age", "msm_count", &msm);
    let male_paths = write_blocks(&dir.path, "adj_male_age_blk_", "age_group", "male_pop", &male);

    let geo = geo();
    let loader = DrawLoader::new(4).unwrap();
    let aggregator = StateAggregator::new(&loader, &geo, AGE);
    let combiner = RateCombiner::new("msm/male age");

    let forward = aggregator.run(&msm_paths, Some(male_paths.as_slice())).unwrap();
    let (forward_rates, _) = combiner.combine(&forward.numerator_sums, &forward.denominator_sums).unwrap();

    let order = [2, 0, 3, 1];
    let msm_shuffled: Vec<_> = order.iter().map(|&i| msm_paths[i].clone()).collect();
    let male_shuffled: Vec<_> = order.iter().map(|&i| male_paths[i].clone()).collect();
    let shuffled = aggregator.run(&msm_shuffled, Some(male_shuffled.as_slice())).unwrap();
    let (shuffled_rates, _) = combiner.combine(&shuffled.numerator_sums, &shuffled.denominator_sums).unwrap();

    assert_eq!(forward_rates.len(), shuffled_rates.len());
    for (a, b) in forward_rates.iter().zip(&shuffled_rates) {
        assert_eq!(a.key, b.key);
        assert_close(a.stats.mean, b.stats.mean, "mean");
        assert_close(a.stats.median, b.stats.median, "median");
        assert_close(a.stats.q025, b.stats.q025, "q025");
        assert_close(a.stats.q975, b.stats.q975, "q975");
    }
}

#[test]
fn state_without_denominator_rows_cannot_form_rates() {
    let dir = Scratch::new("missing-denominator");
    let msm = dir.join("msm.csv");
    write_long(&msm, "age", "msm_count", &[("a", 1, 1, 1.0), ("a", 2, 1, 1.0)]);
    let male = dir.join("male.csv");
    write_long(&male, "age_group", "male_pop", &[("a", 1, 1, 10.0)]);

    let geo = geo();
    let loader = DrawLoader::new(1).unwrap();
    let out = StateAggregator::new(&loader, &geo, AGE)
        .run(&[msm], Some(&[male][..]))
        .unwrap();
    assert_eq!(out.numerator_sums.len(), 2);
    assert_eq!(out.denominator_sums.len(), 1);

    let err = RateCombiner::new("msm/male age")
        .combine(&out.numerator_sums, &out.denominator_sums)
        .unwrap_err();
    assert!(matches!(err, SummaryError::Alignment { ref state, .. } if state == "BB"), "got {err}");
}
