//! End-to-end scenarios S1-S6 from the design notes: a full Hull-White
//! generation run, its martingale validator, correlation reification,
//! and the configuration/domain error paths.

use chrono::NaiveDate;
use ordered_float::OrderedFloat;
use pyesg_rs::config::{
    AnalysisParameters, AnalysisSpec, AssetClass, AssetClassValidation, CorrelationEntry,
    CorrelationMatrix, Economy, OutputSpec, SimulationConfiguration, ValidationConfiguration,
};
use pyesg_rs::error::ConfigError;
use pyesg_rs::{
    generate, validation, AnalysisId, Frequency, InitialisedSettings, ModelId, OutputType,
    Parameters, Reader, YieldCurve,
};

/// The 80 half-year-interval yield curve points used by the reference
/// GBP nominal calibration, term -> continuously-compounded spot rate.
fn yield_curve_points() -> Vec<(f64, f64)> {
    vec![
        (0.5, 0.00679070105770901),
        (1.0, 0.00745916002218801),
        (1.5, 0.0079074852733388),
        (2.0, 0.00836441669643775),
        (2.5, 0.00884161282573678),
        (3.0, 0.00932762601832977),
        (3.5, 0.00981445589941161),
        (4.0, 0.0102969721178294),
        (4.5, 0.0107716710398867),
        (5.0, 0.0112363849191675),
        (5.5, 0.0116900851233338),
        (6.0, 0.0121325124408309),
        (6.5, 0.0125637162796559),
        (7.0, 0.0129837371605093),
        (7.5, 0.0133924143022063),
        (8.0, 0.0137892855650153),
        (8.5, 0.0141736214537358),
        (9.0, 0.0145445182679629),
        (9.5, 0.0149010412164557),
        (10.0, 0.0152422849420296),
        (10.5, 0.0155674503497323),
        (11.0, 0.0158758864638649),
        (11.5, 0.0161671188651251),
        (12.0, 0.0164409074632115),
        (12.5, 0.016697217851849),
        (13.0, 0.0169361824548138),
        (13.5, 0.0171580886888855),
        (14.0, 0.0173633870307634),
        (14.5, 0.0175526692648801),
        (15.0, 0.0177266234016501),
        (15.5, 0.0178859783210095),
        (16.0, 0.0180314895849257),
        (16.5, 0.0181639353683754),
        (17.0, 0.018284106311916),
        (17.5, 0.0183927617968095),
        (18.0, 0.018490607925128),
        (18.5, 0.0185782967490554),
        (19.0, 0.0186563922209754),
        (19.5, 0.0187253557221218),
        (20.0, 0.018785557677642),
        (20.5, 0.0188372886488034),
        (21.0, 0.0188807683798148),
        (21.5, 0.0189161404104334),
        (22.0, 0.0189434581524923),
        (22.5, 0.0189627104915117),
        (23.0, 0.0189738426838589),
        (23.5, 0.0189767792253448),
        (24.0, 0.0189714599105421),
        (24.5, 0.018957845218761),
        (25.0, 0.0189359147882514),
        (25.5, 0.0189056816921497),
        (26.0, 0.0188672208215708),
        (26.5, 0.0188206722776286),
        (27.0, 0.0187662444763932),
        (27.5, 0.0187042132382632),
        (28.0, 0.0186349225161717),
        (28.5, 0.0185587809820652),
        (29.0, 0.0184762565449625),
        (29.5, 0.0183878727980299),
        (30.0, 0.0182942021898953),
        (30.5, 0.0181958450182937),
        (31.0, 0.0180934206282059),
        (31.5, 0.0179875657839365),
        (32.0, 0.0178789330057234),
        (32.5, 0.0177681797287789),
        (33.0, 0.017655948801948),
        (33.5, 0.0175428655247506),
        (34.0, 0.0174295389236686),
        (34.5, 0.0173165628801392),
        (35.0, 0.0172045112957245),
        (35.5, 0.0170939187050309),
        (36.0, 0.0169852750575237),
        (36.5, 0.0168790286221742),
        (37.0, 0.0167755888037096),
        (37.5, 0.0166753287335625),
        (38.0, 0.0165785875430073),
        (38.5, 0.0164856688754966),
        (39.0, 0.0163968357127189),
        (39.5, 0.0163123113348747),
        (40.0, 0.0162322805072689),
    ]
}

fn gbp_nominal_parameters() -> Parameters {
    let mut params = Parameters::new();
    params.insert("alpha".to_string(), OrderedFloat(0.05));
    params.insert("sigma".to_string(), OrderedFloat(0.02));
    for (term, rate) in yield_curve_points() {
        params.insert(format!("yc_{term}"), OrderedFloat(rate));
    }
    params
}

fn s1_config() -> SimulationConfiguration {
    SimulationConfiguration {
        number_of_simulations: 100,
        number_of_projection_steps: 30,
        number_of_batches: 1,
        projection_frequency: Frequency::Annually,
        random_seed: 128,
        start_date: NaiveDate::from_ymd_opt(2018, 1, 1).unwrap(),
        economies: vec![Economy {
            id: "GBP".into(),
            asset_classes: vec![AssetClass {
                id: "GBP_Nominal".into(),
                model_id: ModelId::HullWhite,
                parameters: gbp_nominal_parameters(),
                outputs: vec![
                    OutputSpec {
                        id: "GBP_Nominal_Discount_Factor".into(),
                        output_type: OutputType::DiscountFactor,
                        initial_value: None,
                        parameters: Parameters::new(),
                    },
                    OutputSpec {
                        id: "GBP_Nominal_ZCB_5".into(),
                        output_type: OutputType::ZeroCouponBond,
                        initial_value: None,
                        parameters: {
                            let mut p = Parameters::new();
                            p.insert("term".to_string(), OrderedFloat(5.0));
                            p
                        },
                    },
                    OutputSpec {
                        id: "GBP_Nominal_ZCB_10".into(),
                        output_type: OutputType::ZeroCouponBond,
                        initial_value: None,
                        parameters: {
                            let mut p = Parameters::new();
                            p.insert("term".to_string(), OrderedFloat(10.0));
                            p
                        },
                    },
                    OutputSpec {
                        id: "GBP_Nominal_Cash_Account".into(),
                        output_type: OutputType::CashAccount,
                        initial_value: None,
                        parameters: Parameters::new(),
                    },
                ],
                random_drivers: vec!["GBP_Nominal".into()],
                dependencies: vec![],
            }],
        }],
        correlations: CorrelationMatrix::default(),
    }
}

fn tempfile(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("pyesg_rs_integration_test_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir.join(name)
}

#[test]
fn s1_hull_white_single_economy_annual() {
    let config = s1_config();
    let path = tempfile("s1.pyesg");
    generate(&config, &path).unwrap();

    let mut reader = Reader::open(&path).unwrap();
    assert_eq!(reader.number_of_simulations(), 100);
    assert_eq!(reader.number_of_time_steps(), 31);

    let discount_factor = reader.paths_for_output("GBP_Nominal_Discount_Factor").unwrap();
    let cash_account = reader.paths_for_output("GBP_Nominal_Cash_Account").unwrap();

    // discount factor starts at 1 on every path
    for sim in 0..100 {
        assert!((discount_factor[[sim, 0]] - 1.0).abs() < 1e-6);
    }

    // cash account is the reciprocal of the discount factor, every path and step
    for sim in 0..100 {
        for step in 0..31 {
            let product = cash_account[[sim, step]] as f64 * discount_factor[[sim, step]] as f64;
            assert!((product - 1.0).abs() < 1e-3, "step {step} sim {sim}: {product}");
        }
    }

    // round-trip: paths_for_step matches the corresponding column of paths_for_output
    for step in 0..31 {
        let strided = reader.paths_for_step("GBP_Nominal_Discount_Factor", step).unwrap();
        let column: Vec<f32> = discount_factor.column(step).to_vec();
        assert_eq!(strided, column);
    }
}

#[test]
fn s2_discounted_zcb_martingale_coverage() {
    let config = s1_config();
    let path = tempfile("s2.pyesg");
    generate(&config, &path).unwrap();

    let validation_config = ValidationConfiguration {
        asset_classes: vec![AssetClassValidation {
            asset_class_id: "GBP_Nominal".into(),
            analyses: vec![AnalysisSpec {
                analysis_id: AnalysisId::DiscountedZeroCouponBond,
                parameters: AnalysisParameters {
                    confidence_level: Some(0.95),
                    terms: Some(vec![5.0, 10.0]),
                },
            }],
        }],
    };

    let results = validation::validate(&config, &validation_config, &path).unwrap();
    assert_eq!(results.len(), 2);

    for result in &results {
        let validation::ValidatorResult::Martingale(m) = result else {
            panic!("expected a martingale result");
        };
        let total = m.series.expected_value.len();
        let covered = m
            .series
            .expected_value
            .iter()
            .zip(m.series.lower_confidence_interval.iter())
            .zip(m.series.upper_confidence_interval.iter())
            .filter(|((expected, lower), upper)| **expected >= **lower && **expected <= **upper)
            .count();
        let coverage = covered as f64 / total as f64;
        assert!(coverage >= 0.90, "term {:?} coverage {coverage}", m.term);
    }
}

#[test]
fn s3_correlation_reification() {
    let mut config = s1_config();
    config.economies[0].asset_classes.push(AssetClass {
        id: "GBP_Equities".into(),
        model_id: ModelId::BlackScholes,
        parameters: {
            let mut p = Parameters::new();
            p.insert("sigma".to_string(), OrderedFloat(0.2));
            p
        },
        outputs: vec![],
        random_drivers: vec!["GBP_Equities".into()],
        dependencies: vec!["GBP_Nominal".into()],
    });
    config.correlations.entries.push(CorrelationEntry {
        driver_a: "GBP_Nominal".into(),
        driver_b: "GBP_Equities".into(),
        rho: 0.3,
    });

    let settings = InitialisedSettings::build(&config).unwrap();
    assert_eq!(settings.correlation.nrows(), 2);
    assert_eq!(settings.correlation[(0, 0)], 1.0);
    assert_eq!(settings.correlation[(1, 1)], 1.0);
    assert_eq!(settings.correlation[(0, 1)], 0.3);
    assert_eq!(settings.correlation[(1, 0)], 0.3);
}

#[test]
fn black_scholes_tri_generation_and_validation() {
    let mut config = s1_config();
    config.economies[0].asset_classes.push(AssetClass {
        id: "GBP_Equities".into(),
        model_id: ModelId::BlackScholes,
        parameters: {
            let mut p = Parameters::new();
            p.insert("sigma".to_string(), OrderedFloat(0.2));
            p
        },
        outputs: vec![OutputSpec {
            id: "GBP_Equities_TRI".into(),
            output_type: OutputType::TotalReturnIndex,
            initial_value: Some(1.0),
            parameters: Parameters::new(),
        }],
        random_drivers: vec!["GBP_Equities".into()],
        dependencies: vec!["GBP_Nominal".into()],
    });
    config.correlations.entries.push(CorrelationEntry {
        driver_a: "GBP_Nominal".into(),
        driver_b: "GBP_Equities".into(),
        rho: 0.3,
    });

    let path = tempfile("s_tri.pyesg");
    generate(&config, &path).unwrap();

    let mut reader = Reader::open(&path).unwrap();
    let tri = reader.paths_for_output("GBP_Equities_TRI").unwrap();
    for sim in 0..config.number_of_simulations as usize {
        assert!((tri[[sim, 0]] - 1.0).abs() < 1e-9);
        for step in 0..tri.ncols() {
            assert!(tri[[sim, step]].is_finite(), "step {step} sim {sim} is not finite");
            assert!(tri[[sim, step]] > 0.0, "step {step} sim {sim} is non-positive");
        }
    }

    let validation_config = ValidationConfiguration {
        asset_classes: vec![AssetClassValidation {
            asset_class_id: "GBP_Equities".into(),
            analyses: vec![
                AnalysisSpec {
                    analysis_id: AnalysisId::DiscountedTotalReturnIndex,
                    parameters: AnalysisParameters {
                        confidence_level: Some(0.95),
                        terms: None,
                    },
                },
                AnalysisSpec {
                    analysis_id: AnalysisId::TotalReturnIndexLogReturnMoments,
                    parameters: AnalysisParameters::default(),
                },
            ],
        }],
    };

    let results = validation::validate(&config, &validation_config, &path).unwrap();
    assert_eq!(results.len(), 2);

    let martingale = results
        .iter()
        .find_map(|r| match r {
            validation::ValidatorResult::Martingale(m) => Some(m),
            _ => None,
        })
        .expect("expected a martingale result for discounted_total_return_index");
    assert!(martingale
        .series
        .sample_mean
        .iter()
        .all(|v| v.is_finite()));
    let covered = martingale
        .series
        .expected_value
        .iter()
        .zip(martingale.series.lower_confidence_interval.iter())
        .zip(martingale.series.upper_confidence_interval.iter())
        .filter(|((expected, lower), upper)| **expected >= **lower && **expected <= **upper)
        .count();
    let coverage = covered as f64 / martingale.series.expected_value.len() as f64;
    assert!(coverage >= 0.85, "coverage {coverage}");

    let moments = results
        .iter()
        .find_map(|r| match r {
            validation::ValidatorResult::Moments(m) => Some(m),
            _ => None,
        })
        .expect("expected a moments result for total_return_index_log_return_moments");
    assert!(moments.series.variance.iter().all(|&v| v.is_finite() && v >= 0.0));
}

#[test]
fn s4_duplicate_output_id_is_rejected() {
    let mut config = s1_config();
    let duplicate = config.economies[0].asset_classes[0].outputs[0].clone();
    let mut second_asset_class = config.economies[0].asset_classes[0].clone();
    second_asset_class.id = "GBP_Nominal_2".into();
    second_asset_class.outputs = vec![duplicate];
    config.economies[0].asset_classes.push(second_asset_class);

    assert!(matches!(
        InitialisedSettings::build(&config),
        Err(ConfigError::DuplicateOutput(_))
    ));
}

#[test]
fn s5_yield_curve_out_of_range_query_fails() {
    let mut curve = YieldCurve::new();
    for (term, rate) in yield_curve_points() {
        curve.add_point(term, rate);
    }
    assert!(curve.rate(41.0).is_err());
}

#[test]
fn s6_unfinalised_file_is_rejected() {
    let config = s1_config();
    let path = tempfile("s6.pyesg");
    generate(&config, &path).unwrap();

    // sanity: the finalised file opens fine
    assert!(Reader::open(&path).is_ok());

    // truncate before the header so the prefix read itself fails
    let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(4).unwrap();
    assert!(Reader::open(&path).is_err());
}
