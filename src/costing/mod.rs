// Copyright 2023 Remi Bernotavicius

//! Costs are never cached. Every function here reads the entities it is given, and a line
//! whose referenced entity no longer exists contributes nothing.

use crate::database::models::{
    Ingredient, IngredientId, Packaging, PackagingId, PackagingLine, Product, ProductRecipeLine,
    QuantityUnit, Recipe, RecipeId, RecipeLine,
};

mod margin;
mod unit_conversion;

pub use margin::Margin;
pub use unit_conversion::{cost_per_gram, grams_per_unit};

/// Borrowed view of the collections a product cost depends on.
#[derive(Clone, Copy)]
pub struct Catalog<'a> {
    pub ingredients: &'a [Ingredient],
    pub recipes: &'a [Recipe],
    pub packaging: &'a [Packaging],
}

impl<'a> Catalog<'a> {
    pub fn ingredient(&self, id: IngredientId) -> Option<&'a Ingredient> {
        self.ingredients.iter().find(|i| i.id == id)
    }

    pub fn recipe(&self, id: RecipeId) -> Option<&'a Recipe> {
        self.recipes.iter().find(|r| r.id == id)
    }

    pub fn packaging(&self, id: PackagingId) -> Option<&'a Packaging> {
        self.packaging.iter().find(|p| p.id == id)
    }
}

fn costed_lines<'a>(
    recipe: &'a Recipe,
    ingredients: &'a [Ingredient],
) -> impl Iterator<Item = (&'a RecipeLine, &'a Ingredient)> + 'a {
    recipe
        .ingredient_lines
        .iter()
        .filter(|line| line.amount_grams > 0.0)
        .filter_map(move |line| {
            ingredients
                .iter()
                .find(|i| i.id == line.ingredient_id)
                .map(|i| (line, i))
        })
}

pub fn recipe_cost(recipe: &Recipe, ingredients: &[Ingredient]) -> f64 {
    costed_lines(recipe, ingredients)
        .map(|(line, ingredient)| cost_per_gram(ingredient) * line.amount_grams)
        .sum()
}

/// Raw ingredient weight, ignoring any manual override.
pub fn recipe_weight(recipe: &Recipe, ingredients: &[Ingredient]) -> f64 {
    costed_lines(recipe, ingredients)
        .map(|(line, _)| line.amount_grams)
        .sum()
}

/// The manual finished weight when one is set, otherwise the raw ingredient weight.
pub fn effective_weight(recipe: &Recipe, ingredients: &[Ingredient]) -> f64 {
    recipe
        .weight_override()
        .unwrap_or_else(|| recipe_weight(recipe, ingredients))
}

pub fn recipe_cost_per_gram(recipe: &Recipe, ingredients: &[Ingredient]) -> f64 {
    let weight = effective_weight(recipe, ingredients);
    if weight > 0.0 {
        recipe_cost(recipe, ingredients) / weight
    } else {
        0.0
    }
}

pub fn recipe_cost_per_serving(recipe: &Recipe, ingredients: &[Ingredient]) -> f64 {
    recipe_cost(recipe, ingredients) / f64::from(recipe.servings())
}

/// Cost of one unit of `unit` of a recipe: per gram of effective weight, or per serving.
pub fn recipe_unit_cost(recipe: &Recipe, unit: QuantityUnit, ingredients: &[Ingredient]) -> f64 {
    match unit {
        QuantityUnit::ByWeight => recipe_cost_per_gram(recipe, ingredients),
        QuantityUnit::ByServing => recipe_cost_per_serving(recipe, ingredients),
    }
}

fn recipe_line_cost(line: &ProductRecipeLine, recipe: &Recipe, ingredients: &[Ingredient]) -> f64 {
    if line.quantity <= 0.0 {
        return 0.0;
    }
    let cost = recipe_cost(recipe, ingredients);
    match line.quantity_unit {
        QuantityUnit::ByServing => cost * line.quantity / f64::from(recipe.servings()),
        QuantityUnit::ByWeight => {
            let weight = effective_weight(recipe, ingredients);
            if weight > 0.0 {
                cost * line.quantity / weight
            } else {
                0.0
            }
        }
    }
}

fn packaging_line_cost(line: &PackagingLine, packaging: &Packaging) -> f64 {
    packaging.cost * f64::from(line.quantity.max(1))
}

pub fn product_cost(product: &Product, catalog: Catalog<'_>) -> f64 {
    let recipes: f64 = product
        .recipe_lines
        .iter()
        .filter_map(|line| {
            let recipe = catalog.recipe(line.recipe_id)?;
            Some(recipe_line_cost(line, recipe, catalog.ingredients))
        })
        .sum();
    let packaging: f64 = product
        .packaging_lines
        .iter()
        .filter_map(|line| {
            let packaging = catalog.packaging(line.packaging_id)?;
            Some(packaging_line_cost(line, packaging))
        })
        .sum();
    recipes + packaging
}

pub struct IngredientLineCost<'a> {
    pub ingredient: &'a Ingredient,
    pub amount_grams: f64,
    pub cost: f64,
}

pub struct RecipeCostBreakdown<'a> {
    pub recipe: &'a Recipe,
    pub lines: Vec<IngredientLineCost<'a>>,
    pub total_cost: f64,
    pub effective_weight: f64,
    pub cost_per_gram: f64,
    pub cost_per_serving: f64,
}

impl<'a> RecipeCostBreakdown<'a> {
    pub fn new(recipe: &'a Recipe, ingredients: &'a [Ingredient]) -> Self {
        let lines = costed_lines(recipe, ingredients)
            .map(|(line, ingredient)| IngredientLineCost {
                ingredient,
                amount_grams: line.amount_grams,
                cost: cost_per_gram(ingredient) * line.amount_grams,
            })
            .collect();
        Self {
            recipe,
            lines,
            total_cost: recipe_cost(recipe, ingredients),
            effective_weight: effective_weight(recipe, ingredients),
            cost_per_gram: recipe_cost_per_gram(recipe, ingredients),
            cost_per_serving: recipe_cost_per_serving(recipe, ingredients),
        }
    }
}

pub struct RecipeLineCost<'a> {
    pub recipe: &'a Recipe,
    pub quantity: f64,
    pub unit: QuantityUnit,
    pub unit_cost: f64,
    pub cost: f64,
}

pub struct PackagingLineCost<'a> {
    pub packaging: &'a Packaging,
    pub quantity: u32,
    pub cost: f64,
}

pub struct ProductCostBreakdown<'a> {
    pub product: &'a Product,
    pub recipe_lines: Vec<RecipeLineCost<'a>>,
    pub packaging_lines: Vec<PackagingLineCost<'a>>,
    pub recipe_cost: f64,
    pub packaging_cost: f64,
    pub total_cost: f64,
    pub margin: Margin,
}

impl<'a> ProductCostBreakdown<'a> {
    pub fn new(product: &'a Product, catalog: Catalog<'a>) -> Self {
        let recipe_lines: Vec<_> = product
            .recipe_lines
            .iter()
            .filter_map(|line| {
                let recipe = catalog.recipe(line.recipe_id)?;
                Some(RecipeLineCost {
                    recipe,
                    quantity: line.quantity,
                    unit: line.quantity_unit,
                    unit_cost: recipe_unit_cost(recipe, line.quantity_unit, catalog.ingredients),
                    cost: recipe_line_cost(line, recipe, catalog.ingredients),
                })
            })
            .collect();
        let packaging_lines: Vec<_> = product
            .packaging_lines
            .iter()
            .filter_map(|line| {
                let packaging = catalog.packaging(line.packaging_id)?;
                Some(PackagingLineCost {
                    packaging,
                    quantity: line.quantity.max(1),
                    cost: packaging_line_cost(line, packaging),
                })
            })
            .collect();

        let recipe_cost = recipe_lines.iter().map(|l| l.cost).sum::<f64>();
        let packaging_cost = packaging_lines.iter().map(|l| l.cost).sum::<f64>();
        let total_cost = product_cost(product, catalog);
        Self {
            product,
            recipe_lines,
            packaging_lines,
            recipe_cost,
            packaging_cost,
            total_cost,
            margin: Margin::new(total_cost, product.selling_price),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::database::models::*;

    pub fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    pub fn ingredient(id: u32, name: &str, unit: IngredientUnit, price: f64) -> Ingredient {
        Ingredient {
            id: IngredientId(id),
            name: name.into(),
            category: None,
            unit,
            price,
        }
    }

    pub fn recipe(id: u32, name: &str, servings: u32, lines: &[(u32, f64)]) -> Recipe {
        Recipe {
            id: RecipeId(id),
            name: name.into(),
            category: None,
            servings,
            total_weight_override: None,
            ingredient_lines: lines
                .iter()
                .map(|&(ingredient, amount)| RecipeLine {
                    ingredient_id: IngredientId(ingredient),
                    amount_grams: amount,
                })
                .collect(),
        }
    }

    pub fn packaging(id: u32, name: &str, cost: f64) -> Packaging {
        Packaging {
            id: PackagingId(id),
            name: name.into(),
            category: None,
            cost,
            note: None,
        }
    }

    pub fn product(
        id: u32,
        name: &str,
        selling_price: f64,
        recipes: &[(u32, f64, QuantityUnit)],
        packaging: &[(u32, u32)],
    ) -> Product {
        Product {
            id: ProductId(id),
            name: name.into(),
            category: None,
            selling_price,
            recipe_lines: recipes
                .iter()
                .map(|&(recipe, quantity, quantity_unit)| ProductRecipeLine {
                    recipe_id: RecipeId(recipe),
                    quantity,
                    quantity_unit,
                })
                .collect(),
            packaging_lines: packaging
                .iter()
                .map(|&(packaging, quantity)| PackagingLine {
                    packaging_id: PackagingId(packaging),
                    quantity,
                })
                .collect(),
        }
    }

    pub fn flour() -> Ingredient {
        ingredient(1, "麵粉", IngredientUnit::Kilogram, 35.0)
    }

    pub fn eggs() -> Ingredient {
        ingredient(2, "雞蛋", IngredientUnit::Piece, 8.0)
    }

    pub fn butter() -> Ingredient {
        ingredient(3, "奶油", IngredientUnit::Kilogram, 180.0)
    }
}

#[cfg(test)]
use fixtures::*;

#[test]
fn sponge_cake_cost() {
    let ingredients = vec![flour()];
    let cake = recipe(1, "海綿蛋糕", 6, &[(1, 500.0)]);

    assert_close(recipe_cost(&cake, &ingredients), 17.5);
    assert_eq!(recipe_weight(&cake, &ingredients), 500.0);
    assert_close(recipe_cost_per_serving(&cake, &ingredients), 17.5 / 6.0);
    assert_close(recipe_cost_per_gram(&cake, &ingredients), 0.035);
}

#[test]
fn recipe_cost_skips_unusable_lines() {
    let ingredients = vec![flour(), eggs()];
    let cake = recipe(1, "cake", 1, &[(1, 500.0), (2, 0.0), (2, -10.0), (99, 200.0)]);

    assert_close(recipe_cost(&cake, &ingredients), 17.5);
    assert_eq!(recipe_weight(&cake, &ingredients), 500.0);
}

#[test]
fn deleted_ingredient_is_skipped() {
    let mut ingredients = vec![flour(), butter()];
    let cake = recipe(1, "cake", 1, &[(1, 500.0), (3, 100.0)]);
    assert_close(recipe_cost(&cake, &ingredients), 17.5 + 18.0);

    ingredients.retain(|i| i.name != "奶油");
    let without_butter = recipe(1, "cake", 1, &[(1, 500.0)]);
    assert_close(
        recipe_cost(&cake, &ingredients),
        recipe_cost(&without_butter, &ingredients),
    );
    assert_eq!(recipe_weight(&cake, &ingredients), 500.0);
}

#[test]
fn more_of_an_ingredient_costs_more() {
    let ingredients = vec![flour(), eggs()];
    let mut cake = recipe(1, "cake", 1, &[(1, 500.0), (2, 100.0)]);
    let mut cost = recipe_cost(&cake, &ingredients);
    let mut weight = recipe_weight(&cake, &ingredients);

    for _ in 0..5 {
        cake.ingredient_lines[1].amount_grams += 25.0;
        let next_cost = recipe_cost(&cake, &ingredients);
        let next_weight = recipe_weight(&cake, &ingredients);
        assert!(next_cost > cost);
        assert!(next_weight >= weight);
        cost = next_cost;
        weight = next_weight;
    }
}

#[test]
fn weight_override_wins() {
    let ingredients = vec![flour()];
    let mut cake = recipe(1, "cake", 1, &[(1, 500.0)]);
    cake.total_weight_override = Some(400.0);

    assert_eq!(recipe_weight(&cake, &ingredients), 500.0);
    assert_eq!(effective_weight(&cake, &ingredients), 400.0);
    assert_close(recipe_cost_per_gram(&cake, &ingredients), 17.5 / 400.0);

    cake.total_weight_override = Some(0.0);
    assert_eq!(effective_weight(&cake, &ingredients), 500.0);
}

#[test]
fn empty_recipe_costs_nothing() {
    let cake = recipe(1, "cake", 0, &[]);
    assert_eq!(recipe_cost(&cake, &[]), 0.0);
    assert_eq!(recipe_cost_per_gram(&cake, &[]), 0.0);
    assert_eq!(recipe_cost_per_serving(&cake, &[]), 0.0);
}

#[test]
fn product_by_serving() {
    let ingredients = vec![flour()];
    let recipes = vec![recipe(1, "海綿蛋糕", 6, &[(1, 500.0)])];
    let cake = product(1, "6吋海綿蛋糕", 50.0, &[(1, 6.0, QuantityUnit::ByServing)], &[]);
    let catalog = Catalog {
        ingredients: &ingredients,
        recipes: &recipes,
        packaging: &[],
    };

    assert_close(product_cost(&cake, catalog), 17.5);

    let half = product(2, "half", 0.0, &[(1, 3.0, QuantityUnit::ByServing)], &[]);
    assert_close(product_cost(&half, catalog), 8.75);
}

#[test]
fn product_by_weight_and_packaging() {
    let ingredients = vec![flour()];
    let mut cake = recipe(1, "cake", 6, &[(1, 500.0)]);
    cake.total_weight_override = Some(250.0);
    let recipes = vec![cake];
    let packaging = vec![packaging(1, "蛋糕盒 6吋", 15.0), packaging(2, "餅乾袋", 2.0)];
    let boxed = product(
        1,
        "boxed",
        80.0,
        &[(1, 100.0, QuantityUnit::ByWeight)],
        &[(1, 1), (2, 3), (9, 4)],
    );
    let catalog = Catalog {
        ingredients: &ingredients,
        recipes: &recipes,
        packaging: &packaging,
    };

    // 17.5 spread over 250g, 100g used, plus 15 + 3 * 2 of packaging.
    assert_close(product_cost(&boxed, catalog), 7.0 + 21.0);
}

#[test]
fn product_lines_that_contribute_nothing() {
    let ingredients = vec![flour()];
    let recipes = vec![recipe(1, "cake", 6, &[(1, 500.0)]), recipe(2, "empty", 1, &[])];
    let packaging = vec![packaging(1, "bag", 2.0)];
    let odd = product(
        1,
        "odd",
        0.0,
        &[
            (1, 0.0, QuantityUnit::ByWeight),
            (1, -2.0, QuantityUnit::ByServing),
            (2, 100.0, QuantityUnit::ByWeight),
            (7, 100.0, QuantityUnit::ByWeight),
        ],
        &[(1, 0)],
    );
    let catalog = Catalog {
        ingredients: &ingredients,
        recipes: &recipes,
        packaging: &packaging,
    };

    // Only the packaging line counts, with its quantity raised to one.
    assert_close(product_cost(&odd, catalog), 2.0);
}

#[test]
fn product_breakdown_matches_total() {
    let ingredients = vec![flour(), eggs(), butter()];
    let recipes = vec![
        recipe(1, "cake", 6, &[(1, 500.0), (2, 200.0)]),
        recipe(2, "cookie", 20, &[(1, 300.0), (3, 150.0)]),
    ];
    let packaging = vec![packaging(1, "box", 15.0)];
    let gift = product(
        1,
        "gift",
        250.0,
        &[
            (1, 2.0, QuantityUnit::ByServing),
            (2, 120.0, QuantityUnit::ByWeight),
            (5, 1.0, QuantityUnit::ByServing),
        ],
        &[(1, 2)],
    );
    let catalog = Catalog {
        ingredients: &ingredients,
        recipes: &recipes,
        packaging: &packaging,
    };

    let breakdown = ProductCostBreakdown::new(&gift, catalog);
    assert_eq!(breakdown.recipe_lines.len(), 2);
    assert_eq!(breakdown.packaging_lines.len(), 1);
    assert_close(breakdown.packaging_cost, 30.0);
    assert_close(
        breakdown.recipe_cost + breakdown.packaging_cost,
        breakdown.total_cost,
    );
    assert_close(breakdown.total_cost, product_cost(&gift, catalog));
    assert_close(breakdown.margin.profit, 250.0 - breakdown.total_cost);
    assert_close(
        breakdown.recipe_lines[0].unit_cost,
        recipe_cost_per_serving(&recipes[0], &ingredients),
    );
}

#[test]
fn recipe_breakdown_lists_costed_lines() {
    let ingredients = vec![flour(), butter()];
    let cake = recipe(1, "cake", 4, &[(1, 500.0), (3, 100.0), (8, 50.0)]);

    let breakdown = RecipeCostBreakdown::new(&cake, &ingredients);
    let names: Vec<_> = breakdown.lines.iter().map(|l| l.ingredient.name.as_str()).collect();
    assert_eq!(names, ["麵粉", "奶油"]);
    assert_close(breakdown.lines[1].cost, 18.0);
    assert_close(breakdown.total_cost, 35.5);
    assert_eq!(breakdown.effective_weight, 600.0);
    assert_close(breakdown.cost_per_serving, 35.5 / 4.0);
}
