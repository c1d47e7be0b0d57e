// Copyright 2023 Remi Bernotavicius

use crate::database::models::{Ingredient, NutritionFact, Nutrients, Recipe, RecipeNutrition};

/// Nutrition facts are matched to ingredients by exact name. Renaming an ingredient without
/// renaming its fact silently drops it from every recipe total.
pub fn fact_for<'a>(
    ingredient: &Ingredient,
    facts: &'a [NutritionFact],
) -> Option<&'a NutritionFact> {
    facts.iter().find(|f| f.ingredient_name == ingredient.name)
}

pub fn recipe_totals(
    recipe: &Recipe,
    ingredients: &[Ingredient],
    facts: &[NutritionFact],
) -> Nutrients {
    recipe
        .ingredient_lines
        .iter()
        .filter_map(|line| {
            let ingredient = ingredients.iter().find(|i| i.id == line.ingredient_id)?;
            let fact = fact_for(ingredient, facts)?;
            Some(fact.per_100g.scale(line.amount_grams / 100.0))
        })
        .sum()
}

/// Rebuilds the whole derived table, one row per recipe in recipe order.
pub fn recompute_all(
    recipes: &[Recipe],
    ingredients: &[Ingredient],
    facts: &[NutritionFact],
) -> Vec<RecipeNutrition> {
    let table: Vec<_> = recipes
        .iter()
        .map(|recipe| RecipeNutrition {
            recipe_id: recipe.id,
            recipe_name: recipe.name.clone(),
            totals: recipe_totals(recipe, ingredients, facts),
        })
        .collect();
    log::debug!("recomputed nutrition for {} recipes", table.len());
    table
}

#[cfg(test)]
use crate::costing::fixtures::*;
#[cfg(test)]
use crate::database::models::{IngredientUnit, NutritionId};

#[cfg(test)]
fn fact(id: u32, ingredient_name: &str, calories: f64, protein: f64) -> NutritionFact {
    NutritionFact {
        id: NutritionId(id),
        ingredient_name: ingredient_name.into(),
        per_100g: Nutrients {
            calories,
            protein,
            ..Nutrients::zero()
        },
    }
}

#[test]
fn flour_calories() {
    let ingredients = vec![flour()];
    let recipes = vec![recipe(1, "海綿蛋糕", 6, &[(1, 500.0)])];
    let facts = vec![fact(1, "麵粉", 364.0, 10.3)];

    let table = recompute_all(&recipes, &ingredients, &facts);
    assert_eq!(table.len(), 1);
    assert_eq!(table[0].recipe_name, "海綿蛋糕");
    assert_close(table[0].totals.calories, 1820.0);
    assert_close(table[0].totals.protein, 51.5);
    assert_eq!(table[0].totals.sodium, 0.0);
}

#[test]
fn totals_sum_over_lines() {
    let ingredients = vec![flour(), eggs(), butter()];
    let recipes = vec![recipe(1, "cake", 6, &[(1, 200.0), (2, 50.0), (3, 100.0)])];
    let facts = vec![
        fact(1, "麵粉", 364.0, 10.3),
        fact(2, "雞蛋", 155.0, 13.0),
        fact(3, "奶油", 717.0, 0.85),
    ];

    let table = recompute_all(&recipes, &ingredients, &facts);
    assert_close(table[0].totals.calories, 728.0 + 77.5 + 717.0);
}

#[test]
fn missing_data_gives_zero_totals() {
    let ingredients = vec![flour(), ingredient(2, "可可粉", IngredientUnit::Kilogram, 300.0)];
    let recipes = vec![
        recipe(1, "empty", 1, &[]),
        recipe(2, "cocoa", 1, &[(2, 100.0)]),
        recipe(3, "dangling", 1, &[(42, 100.0)]),
    ];
    let facts = vec![fact(1, "麵粉", 364.0, 10.3)];

    let table = recompute_all(&recipes, &ingredients, &facts);
    assert_eq!(table.len(), 3);
    for row in &table {
        assert_eq!(row.totals, Nutrients::zero());
    }
}

#[test]
fn renamed_ingredient_loses_its_facts() {
    let mut ingredients = vec![flour()];
    let recipes = vec![recipe(1, "cake", 1, &[(1, 100.0)])];
    let facts = vec![fact(1, "麵粉", 364.0, 10.3)];
    assert_close(
        recompute_all(&recipes, &ingredients, &facts)[0].totals.calories,
        364.0,
    );

    ingredients[0].name = "高筋麵粉".into();
    assert_eq!(
        recompute_all(&recipes, &ingredients, &facts)[0].totals.calories,
        0.0
    );
}

#[test]
fn recompute_is_idempotent() {
    let ingredients = vec![flour(), eggs()];
    let recipes = vec![
        recipe(1, "cake", 6, &[(1, 500.0), (2, 100.0)]),
        recipe(2, "bread", 2, &[(1, 1000.0)]),
    ];
    let facts = vec![fact(1, "麵粉", 364.0, 10.3), fact(2, "雞蛋", 155.0, 13.0)];

    let first = recompute_all(&recipes, &ingredients, &facts);
    let second = recompute_all(&recipes, &ingredients, &facts);
    assert_eq!(first, second);
}
