use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use trigger_engine::indicators::{calculate_ema, calculate_rsi, Ema};
use trigger_engine::metrics::MetricsCalculator;
use trigger_engine::signals::SignalEngine;
use trigger_engine::{
    generate_synthetic_bars, Bar, EquityPoint, Indicator, Logic, Operator, StrategySpec,
    Timeframe, TriggerSpec,
};

fn curve(equity: &[f64]) -> Vec<EquityPoint> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    equity
        .iter()
        .enumerate()
        .map(|(i, &e)| EquityPoint {
            timestamp: start + Duration::days(i as i64),
            equity: e,
        })
        .collect()
}

fn multi_timeframe_strategy() -> StrategySpec {
    StrategySpec::new("mtf")
        .with_trigger(
            TriggerSpec::new(Indicator::rsi(14), Operator::Lt)
                .with_timeframe(Timeframe::hours(4))
                .with_value(55.0),
        )
        .with_trigger(
            TriggerSpec::new(Indicator::bollinger(20, 2.0), Operator::Gt)
                .with_field("close")
                .with_compare_to("middle"),
        )
        .with_trigger(
            TriggerSpec::new(Indicator::ema(10), Operator::CrossesUp)
                .with_field("close")
                .with_compare_to("ema"),
        )
        .with_logic(Logic::Or)
}

fn scale_after(bars: &[Bar], cut: usize, factor: f64) -> Vec<Bar> {
    bars.iter()
        .enumerate()
        .map(|(i, b)| {
            if i <= cut {
                b.clone()
            } else {
                Bar::new(
                    b.timestamp,
                    b.open * factor,
                    b.high * factor,
                    b.low * factor,
                    b.close * factor,
                    b.volume * factor,
                )
            }
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 32,
        .. ProptestConfig::default()
    })]

    #[test]
    fn signal_never_looks_ahead(
        seed in 0u64..1_000,
        cut in 0usize..200,
        factor in 0.5f64..2.0,
    ) {
        let bars = generate_synthetic_bars(200, 100.0, seed, Timeframe::hours(1));
        let mutated = scale_after(&bars, cut, factor);
        let strategy = multi_timeframe_strategy();

        let original = SignalEngine::new(&bars).composite(&strategy).unwrap();
        let changed = SignalEngine::new(&mutated).composite(&strategy).unwrap();

        prop_assert_eq!(&original[..=cut], &changed[..=cut]);
    }

    #[test]
    fn max_drawdown_is_bounded(equity in prop::collection::vec(0.01f64..100_000.0, 2..200)) {
        let (max_dd, _) = MetricsCalculator::calculate_max_drawdown(&curve(&equity));
        prop_assert!((0.0..=1.0).contains(&max_dd));

        let non_decreasing = equity.windows(2).all(|w| w[1] >= w[0]);
        prop_assert_eq!(max_dd == 0.0, non_decreasing);
    }

    #[test]
    fn streaming_ema_matches_batch(
        prices in prop::collection::vec(1.0f64..1_000.0, 1..150),
        period in 1usize..30,
    ) {
        let batch = calculate_ema(&prices, period);
        let mut ema = Ema::new(period);

        for (i, &p) in prices.iter().enumerate() {
            match ema.next(p) {
                Some(v) => prop_assert!((v - batch[i]).abs() <= 1e-9 * v.abs().max(1.0)),
                None => prop_assert!(batch[i].is_nan()),
            }
        }
    }

    #[test]
    fn indicator_computation_is_idempotent(
        prices in prop::collection::vec(1.0f64..1_000.0, 1..150),
        period in 2usize..30,
    ) {
        let first = calculate_rsi(&prices, period);
        let second = calculate_rsi(&prices, period);
        prop_assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            prop_assert!(a == b || (a.is_nan() && b.is_nan()));
        }
    }
}
