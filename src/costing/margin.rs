// Copyright 2023 Remi Bernotavicius

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margin {
    pub profit: f64,
    pub profit_margin_percent: f64,
}

impl Margin {
    pub fn new(cost: f64, selling_price: f64) -> Self {
        let profit = selling_price - cost;
        let profit_margin_percent = if selling_price > 0.0 {
            profit / selling_price * 100.0
        } else {
            0.0
        };
        Self {
            profit,
            profit_margin_percent,
        }
    }

    /// Presentation flag only; a loss is still a valid product.
    pub fn is_profitable(&self) -> bool {
        self.profit >= 0.0
    }
}

#[test]
fn margin_on_sale() {
    let m = Margin::new(17.5, 50.0);
    assert_eq!(m.profit, 32.5);
    assert!((m.profit_margin_percent - 65.0).abs() < 1e-9);
    assert!(m.is_profitable());
}

#[test]
fn margin_at_a_loss() {
    let m = Margin::new(60.0, 50.0);
    assert_eq!(m.profit, -10.0);
    assert!((m.profit_margin_percent + 20.0).abs() < 1e-9);
    assert!(!m.is_profitable());
}

#[test]
fn margin_without_price() {
    let m = Margin::new(17.5, 0.0);
    assert_eq!(m.profit, -17.5);
    assert_eq!(m.profit_margin_percent, 0.0);
}
