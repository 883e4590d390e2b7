use chrono::{NaiveDate, NaiveDateTime};
use stats_histogram::{
    Arena, Collation, CollatedStr, ColumnIdentity, Decimal, EquiHeight, EquiHeightHistogram,
    HistogramConfig, HistogramError, Predicate, ValueMap,
};

fn column(name: &str) -> ColumnIdentity {
    ColumnIdentity::new("shop", "orders", name)
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn ten_distinct_values_in_three_buckets() {
    let arena = Arena::new();
    let map = ValueMap::from_values(1u64..=10);
    let histogram =
        EquiHeight::build(&arena, column("qty"), &map, &HistogramConfig::with_num_buckets(3))
            .unwrap();

    assert_eq!(histogram.num_buckets(), 3);
    let cumulative: Vec<f64> = histogram
        .buckets()
        .iter()
        .map(|bucket| bucket.cumulative_frequency())
        .collect();
    assert!(cumulative.windows(2).all(|pair| pair[0] < pair[1]));
    assert!(approx(*cumulative.last().unwrap(), 1.0));

    let containing = histogram
        .buckets()
        .iter()
        .position(|bucket| *bucket.lower_inclusive() <= 5 && 5 <= *bucket.upper_inclusive())
        .unwrap();
    let previous = containing
        .checked_sub(1)
        .map_or(0.0, |idx| cumulative[idx]);
    let bucket = &histogram.buckets()[containing];
    let expected = (bucket.cumulative_frequency() - previous) / bucket.num_distinct() as f64;
    assert!(approx(histogram.equal_to_selectivity(&5), expected));
}

#[test]
fn all_values_identical() {
    let arena = Arena::new();
    let mut map = ValueMap::new();
    map.add_value(7i64, 100);
    map.add_null_values(25);
    let histogram =
        EquiHeight::build(&arena, column("flag"), &map, &HistogramConfig::with_num_buckets(5))
            .unwrap();

    assert_eq!(histogram.num_buckets(), 1);
    let bucket = &histogram.buckets()[0];
    assert!(bucket.is_singleton());
    assert!(approx(bucket.cumulative_frequency(), 0.8));
    assert!(approx(histogram.equal_to_selectivity(&7), 0.8));
    assert_eq!(histogram.equal_to_selectivity(&8), 0.0);
    assert!(approx(histogram.selectivity(&Predicate::IsNull), 0.2));
}

#[test]
fn only_null_values() {
    let arena = Arena::new();
    let mut map = ValueMap::<f64>::new();
    map.add_null_values(40);
    let histogram =
        EquiHeight::build(&arena, column("discount"), &map, &HistogramConfig::default()).unwrap();

    assert!(histogram.buckets().is_empty());
    assert_eq!(histogram.null_values_fraction(), 1.0);
    for probe in [-1.0, 0.0, 3.5] {
        assert_eq!(histogram.equal_to_selectivity(&probe), 0.0);
        assert_eq!(histogram.less_than_selectivity(&probe), 0.0);
        assert_eq!(histogram.greater_than_selectivity(&probe), 0.0);
    }
}

#[test]
fn case_insensitive_strings_survive_a_round_trip() {
    let collation = Collation::Utf8mb4GeneralCi;
    let arena = Arena::new();
    let mut map = ValueMap::with_collation(collation);
    for name in ["apple", "Apple", "banana", "cherry"] {
        map.add_value(CollatedStr::from_text(name, collation), 1);
    }
    let histogram =
        EquiHeight::build(&arena, column("fruit"), &map, &HistogramConfig::with_num_buckets(8))
            .unwrap();
    let probe = CollatedStr::from_text("APPLE", collation);
    assert!(approx(histogram.equal_to_selectivity(&probe), 0.5));

    let json = histogram.histogram_to_json().unwrap();
    assert_eq!(json["collation-id"], 45);
    assert_eq!(json["data-type"], "string");

    let loaded_arena = Arena::new();
    let loaded = EquiHeight::<CollatedStr<'_>>::from_json(&loaded_arena, column("fruit"), &json)
        .unwrap();
    assert_eq!(loaded.base().collation(), collation);
    let probe = CollatedStr::from_text("aPpLe", collation);
    assert!(approx(loaded.equal_to_selectivity(&probe), 0.5));
    let probe = CollatedStr::from_text("BANANA", collation);
    assert!(approx(loaded.less_than_selectivity(&probe), 0.5));
}

#[test]
fn string_clone_owns_its_bytes() {
    let target = Arena::new();
    let copy = {
        let owned: Vec<String> = ["delta", "alpha", "charlie", "bravo"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let source = Arena::new();
        let mut map = ValueMap::new();
        for name in &owned {
            map.add_value(CollatedStr::from_text(name, Collation::Binary), 1);
        }
        let mut histogram = EquiHeight::create(column("code"));
        histogram.build_histogram(&source, &map, 2).unwrap();
        histogram.clone_in(&target).unwrap()
    };
    let lowest = copy.buckets()[0].lower_inclusive();
    assert_eq!(lowest.as_bytes(), b"alpha");
    assert_eq!(copy.buckets().last().unwrap().upper_inclusive().as_bytes(), b"delta");
}

fn endpoints<'a>(histogram: &EquiHeight<'a, CollatedStr<'a>>) -> Vec<(Vec<u8>, Vec<u8>)> {
    histogram
        .buckets()
        .iter()
        .map(|bucket| {
            (
                bucket.lower_inclusive().as_bytes().to_vec(),
                bucket.upper_inclusive().as_bytes().to_vec(),
            )
        })
        .collect()
}

#[test]
fn binary_strings_survive_a_round_trip() {
    let arena = Arena::new();
    let mut map = ValueMap::with_collation(Collation::Binary);
    map.add_value(CollatedStr::new(&[0x01, 0xff], Collation::Binary), 3);
    map.add_value(CollatedStr::new(&[0x02, 0xfe], Collation::Binary), 2);
    map.add_value(CollatedStr::from_text("plain", Collation::Binary), 1);
    let histogram =
        EquiHeight::build(&arena, column("blob"), &map, &HistogramConfig::with_num_buckets(4))
            .unwrap();
    assert_eq!(histogram.num_buckets(), 3);

    let text = serde_json::to_string(&histogram.histogram_to_json().unwrap()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    let loaded_arena = Arena::new();
    let loaded = EquiHeight::<CollatedStr<'_>>::from_json(&loaded_arena, column("blob"), &json)
        .unwrap();

    assert_eq!(endpoints(&loaded), endpoints(&histogram));
    assert_eq!(loaded.histogram_to_json().unwrap(), json);
    let probe = CollatedStr::new(&[0x01, 0xff], Collation::Binary);
    assert!(approx(loaded.equal_to_selectivity(&probe), 0.5));
}

fn day(d: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, d)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

#[test]
fn datetime_ranges_interpolate_by_elapsed_time() {
    let arena = Arena::new();
    let map = ValueMap::from_values((1..=4).map(|d| day(d, 0)));
    let histogram =
        EquiHeight::build(&arena, column("placed"), &map, &HistogramConfig::with_num_buckets(1))
            .unwrap();

    assert_eq!(histogram.num_buckets(), 1);
    assert!(approx(histogram.less_than_selectivity(&day(2, 12)), 0.5));
    assert!(approx(histogram.greater_than_selectivity(&day(2, 12)), 0.5));

    let json = histogram.histogram_to_json().unwrap();
    assert_eq!(json["buckets"][0][0], "2024-01-01 00:00:00.000000");
    let loaded = EquiHeightHistogram::from_json(&arena, column("placed"), &json).unwrap();
    assert!(matches!(loaded, EquiHeightHistogram::Datetime(_)));
}

#[test]
fn decimals_compare_numerically() {
    let arena = Arena::new();
    let values: Vec<Decimal> = ["1.00", "2.50", "2.5", "4.00"]
        .iter()
        .map(|text| text.parse().unwrap())
        .collect();
    let map = ValueMap::from_values(values);
    assert_eq!(map.len(), 3);

    let histogram =
        EquiHeight::build(&arena, column("price"), &map, &HistogramConfig::with_num_buckets(8))
            .unwrap();
    let probe: Decimal = "2.500".parse().unwrap();
    assert!(approx(histogram.equal_to_selectivity(&probe), 0.5));

    let json = histogram.histogram_to_json().unwrap();
    assert!(json["buckets"][0][0].is_string());
    let loaded = EquiHeight::<Decimal>::from_json(&arena, column("price"), &json).unwrap();
    assert_eq!(loaded.buckets(), histogram.buckets());
}

#[test]
fn predicates_stay_within_bounds() {
    let arena = Arena::new();
    let mut map = ValueMap::new();
    map.add_values((0i64..50).map(|v| (v * 2, 1 + (v % 4) as u64)));
    map.add_null_values(10);
    let histogram =
        EquiHeight::build(&arena, column("score"), &map, &HistogramConfig::with_num_buckets(7))
            .unwrap();
    let non_null = histogram.non_null_values_frequency();

    for probe in -5i64..110 {
        for selectivity in [
            histogram.equal_to_selectivity(&probe),
            histogram.less_than_selectivity(&probe),
            histogram.greater_than_selectivity(&probe),
        ] {
            assert!((0.0..=non_null + 1e-9).contains(&selectivity));
        }
        for predicate in [
            Predicate::Equal(probe),
            Predicate::NotEqual(probe),
            Predicate::LessThan(probe),
            Predicate::LessThanOrEqual(probe),
            Predicate::GreaterThan(probe),
            Predicate::GreaterThanOrEqual(probe),
            Predicate::Between(probe, probe + 10),
            Predicate::NotBetween(probe, probe + 10),
            Predicate::IsNull,
            Predicate::IsNotNull,
        ] {
            let selectivity = histogram.selectivity(&predicate);
            assert!(
                (0.0..=1.0).contains(&selectivity),
                "{predicate:?} gave {selectivity}"
            );
        }
    }
}

#[test]
fn concurrent_readers_share_a_built_histogram() {
    let arena = Arena::new();
    let map = ValueMap::from_values((0..1_000).map(|v: u64| v % 97));
    let histogram =
        EquiHeight::build(&arena, column("bucket"), &map, &HistogramConfig::with_num_buckets(16))
            .unwrap();
    let expected: Vec<f64> = (0..97)
        .map(|v| histogram.less_than_selectivity(&v))
        .collect();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for v in 0..97u64 {
                    assert_eq!(histogram.less_than_selectivity(&v), expected[v as usize]);
                }
                histogram.histogram_to_json().unwrap();
            });
        }
    });
}

#[test]
fn exhausted_arena_reports_allocation_failure() {
    let arena = Arena::with_limit(0);
    let map = ValueMap::from_values([1.0f64, 2.0, 3.0]);
    let err = EquiHeight::build(&arena, column("ratio"), &map, &HistogramConfig::default())
        .unwrap_err();
    assert_eq!(err, HistogramError::Allocation);
}
