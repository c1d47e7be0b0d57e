// Copyright 2023 Remi Bernotavicius

use crate::database::models::{Ingredient, IngredientUnit};

/// How many grams one purchased unit is taken to weigh. Liquids are assumed to be 1g/mL and a
/// piece is costed as an average egg. Units without a rule (including unknown labels) are
/// priced as if the price were already per gram.
pub fn grams_per_unit(unit: &IngredientUnit) -> f64 {
    match unit {
        IngredientUnit::Kilogram => 1_000.0,
        IngredientUnit::Liter => 1_000.0,
        IngredientUnit::Piece => 50.0,
        IngredientUnit::Gram
        | IngredientUnit::Milliliter
        | IngredientUnit::Pack
        | IngredientUnit::Other(_) => 1.0,
    }
}

pub fn cost_per_gram(ingredient: &Ingredient) -> f64 {
    ingredient.price / grams_per_unit(&ingredient.unit)
}

#[cfg(test)]
fn priced(price: f64, unit: IngredientUnit) -> Ingredient {
    Ingredient {
        id: crate::database::models::IngredientId(1),
        name: "test".into(),
        category: None,
        unit,
        price,
    }
}

#[test]
fn cost_per_gram_by_unit() {
    use IngredientUnit::*;

    assert_eq!(cost_per_gram(&priced(180.0, Kilogram)), 0.18);
    assert_eq!(cost_per_gram(&priced(35.0, Kilogram)), 0.035);
    assert_eq!(cost_per_gram(&priced(8.0, Piece)), 0.16);
    assert_eq!(cost_per_gram(&priced(65.0, Liter)), 0.065);
}

#[test]
fn cost_per_gram_falls_back_to_price() {
    use IngredientUnit::*;

    assert_eq!(cost_per_gram(&priced(0.5, Gram)), 0.5);
    assert_eq!(cost_per_gram(&priced(0.2, Milliliter)), 0.2);
    assert_eq!(cost_per_gram(&priced(12.0, Pack)), 12.0);
    assert_eq!(cost_per_gram(&priced(30.0, Other("打".into()))), 30.0);
}
