// Copyright 2023 Remi Bernotavicius

use crate::costing::{self, Margin, ProductCostBreakdown, RecipeCostBreakdown};
use crate::repository::{EntityKind, Repository};
use std::fmt;
use thousands::Separable as _;

pub fn money(amount: f64) -> String {
    format!("{amount:.2}").separate_with_commas()
}

pub fn cost_per_gram(amount: f64) -> String {
    format!("{amount:.3}")
}

pub fn percent(amount: f64) -> String {
    format!("{amount:.1}%")
}

fn grams(amount: f64) -> String {
    format!("{}g", amount.separate_with_commas())
}

fn margin_line(f: &mut fmt::Formatter<'_>, margin: &Margin) -> fmt::Result {
    let flag = if margin.is_profitable() { "" } else { " (loss)" };
    writeln!(
        f,
        "  profit {} / margin {}{flag}",
        money(margin.profit),
        percent(margin.profit_margin_percent)
    )
}

/// Cost of every recipe and product, as shown by `summary`.
pub struct Summary<'a>(pub &'a Repository);

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repository = self.0;
        let ingredients = repository.ingredients();

        writeln!(f, "配方 ({})", repository.recipes().len())?;
        for recipe in repository.recipes() {
            writeln!(
                f,
                "  [{}] {}: cost {}, weight {}, {}/g, {}/serving",
                recipe.id,
                recipe.name,
                money(costing::recipe_cost(recipe, ingredients)),
                grams(costing::effective_weight(recipe, ingredients)),
                cost_per_gram(costing::recipe_cost_per_gram(recipe, ingredients)),
                money(costing::recipe_cost_per_serving(recipe, ingredients)),
            )?;
        }

        writeln!(f, "商品 ({})", repository.products().len())?;
        for product in repository.products() {
            let cost = costing::product_cost(product, repository.catalog());
            let margin = Margin::new(cost, product.selling_price);
            writeln!(
                f,
                "  [{}] {}: cost {}, price {}",
                product.id,
                product.name,
                money(cost),
                money(product.selling_price),
            )?;
            margin_line(f, &margin)?;
        }
        Ok(())
    }
}

pub struct RecipeDetail<'a>(pub &'a RecipeCostBreakdown<'a>);

impl fmt::Display for RecipeDetail<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        writeln!(f, "{} ({} servings)", b.recipe.name, b.recipe.servings())?;
        for line in &b.lines {
            writeln!(
                f,
                "  {}: {} @ {}/{} = {}",
                line.ingredient.name,
                grams(line.amount_grams),
                money(line.ingredient.price),
                line.ingredient.unit,
                money(line.cost),
            )?;
        }
        writeln!(f, "  total cost {}", money(b.total_cost))?;
        match b.recipe.weight_override() {
            Some(_) => writeln!(f, "  weight {} (measured)", grams(b.effective_weight))?,
            None => writeln!(f, "  weight {}", grams(b.effective_weight))?,
        }
        writeln!(f, "  cost per gram {}", cost_per_gram(b.cost_per_gram))?;
        writeln!(f, "  cost per serving {}", money(b.cost_per_serving))
    }
}

pub struct ProductDetail<'a>(pub &'a ProductCostBreakdown<'a>);

impl fmt::Display for ProductDetail<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        writeln!(f, "{}", b.product.name)?;
        for line in &b.recipe_lines {
            writeln!(
                f,
                "  {}: {}{} @ {} = {}",
                line.recipe.name,
                line.quantity,
                line.unit,
                cost_per_gram(line.unit_cost),
                money(line.cost),
            )?;
        }
        writeln!(f, "  recipes {}", money(b.recipe_cost))?;
        for line in &b.packaging_lines {
            writeln!(
                f,
                "  {} x{} = {}",
                line.packaging.name,
                line.quantity,
                money(line.cost)
            )?;
        }
        writeln!(f, "  packaging {}", money(b.packaging_cost))?;
        writeln!(
            f,
            "  total cost {}, price {}",
            money(b.total_cost),
            money(b.product.selling_price)
        )?;
        margin_line(f, &b.margin)
    }
}

pub struct Counts<'a>(pub &'a Repository);

impl fmt::Display for Counts<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for kind in EntityKind::iter() {
            writeln!(f, "{kind}: {}", self.0.len(kind))?;
        }
        Ok(())
    }
}

/// Tab-separated rows under their header, for printing search results.
pub struct Table<'a> {
    pub kind: EntityKind,
    pub rows: &'a [Vec<String>],
}

impl fmt::Display for Table<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.kind.headers().join("\t"))?;
        for row in self.rows {
            writeln!(f, "{}", row.join("\t"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
use crate::costing::fixtures::*;
#[cfg(test)]
use crate::costing::Catalog;
#[cfg(test)]
use crate::database::models::QuantityUnit;

#[test]
fn number_formats() {
    assert_eq!(money(1234567.891), "1,234,567.89");
    assert_eq!(money(-1500.0), "-1,500.00");
    assert_eq!(money(17.5), "17.50");
    assert_eq!(cost_per_gram(0.035), "0.035");
    assert_eq!(percent(65.0), "65.0%");
    assert_eq!(grams(1200.0), "1,200g");
}

#[test]
fn recipe_detail_lists_lines() {
    let ingredients = vec![flour(), butter()];
    let cake = recipe(1, "海綿蛋糕", 6, &[(1, 500.0), (3, 100.0)]);
    let breakdown = RecipeCostBreakdown::new(&cake, &ingredients);

    let text = RecipeDetail(&breakdown).to_string();
    assert!(text.starts_with("海綿蛋糕 (6 servings)\n"));
    assert!(text.contains("  麵粉: 500g @ 35.00/公斤 = 17.50\n"));
    assert!(text.contains("  total cost 35.50\n"));
    assert!(text.contains("  weight 600g\n"));
}

#[test]
fn product_detail_flags_losses() {
    let ingredients = vec![flour()];
    let recipes = vec![recipe(1, "海綿蛋糕", 6, &[(1, 500.0)])];
    let packaging = vec![packaging(1, "蛋糕盒 6吋", 15.0)];
    let cake = product(
        1,
        "6吋海綿蛋糕",
        30.0,
        &[(1, 6.0, QuantityUnit::ByServing)],
        &[(1, 1)],
    );
    let catalog = Catalog {
        ingredients: &ingredients,
        recipes: &recipes,
        packaging: &packaging,
    };
    let breakdown = ProductCostBreakdown::new(&cake, catalog);

    let text = ProductDetail(&breakdown).to_string();
    assert!(text.contains("  海綿蛋糕: 6份 @ 2.917 = 17.50\n"));
    assert!(text.contains("  蛋糕盒 6吋 x1 = 15.00\n"));
    assert!(text.contains("  total cost 32.50, price 30.00\n"));
    assert!(text.contains("(loss)"));
}

#[test]
fn summary_and_counts() {
    let mut repository = Repository::new();
    repository.seed_samples_if_empty();
    let summary = Summary(&repository).to_string();
    assert!(summary.starts_with("配方 (0)\n"));

    let counts = Counts(&repository).to_string();
    assert!(counts.contains("原料: 5\n"));
    assert!(counts.contains("配方營養成分: 0\n"));
}
