// Copyright 2023 Remi Bernotavicius

//! Command-line forms for creating and editing entities.

use crate::database::models::{
    IngredientId, IngredientUnit, Nutrients, PackagingId, PackagingLine, ProductRecipeLine,
    QuantityUnit, RecipeId, RecipeLine,
};
use crate::repository::{
    IngredientInput, NutritionInput, PackagingInput, ProductInput, RecipeInput, Repository,
    ValidationError,
};
use clap::{Args, Subcommand};

fn parse_id(s: &str) -> Result<u32, String> {
    s.trim()
        .parse()
        .map_err(|_| format!("{s:?} is not an id"))
}

fn parse_amount(s: &str) -> Result<f64, String> {
    s.trim()
        .parse()
        .map_err(|_| format!("{s:?} is not a number"))
}

/// `<INGREDIENT_ID>:<GRAMS>`
fn parse_recipe_line(s: &str) -> Result<RecipeLine, String> {
    let (id, amount) = s
        .split_once(':')
        .ok_or_else(|| format!("expected <INGREDIENT_ID>:<GRAMS>, got {s:?}"))?;
    Ok(RecipeLine {
        ingredient_id: IngredientId(parse_id(id)?),
        amount_grams: parse_amount(amount)?,
    })
}

/// `<RECIPE_ID>:<QUANTITY>[:weight|serving]`, by weight when the unit is left out.
fn parse_product_recipe_line(s: &str) -> Result<ProductRecipeLine, String> {
    let mut parts = s.split(':');
    let (Some(id), Some(quantity)) = (parts.next(), parts.next()) else {
        return Err(format!(
            "expected <RECIPE_ID>:<QUANTITY>[:weight|serving], got {s:?}"
        ));
    };
    let quantity_unit = match parts.next().map(str::trim) {
        None | Some("weight") | Some("g") => QuantityUnit::ByWeight,
        Some("serving") | Some("份") => QuantityUnit::ByServing,
        Some(other) => return Err(format!("unknown quantity unit {other:?}")),
    };
    Ok(ProductRecipeLine {
        recipe_id: RecipeId(parse_id(id)?),
        quantity: parse_amount(quantity)?,
        quantity_unit,
    })
}

/// `<PACKAGING_ID>[:<QUANTITY>]`
fn parse_packaging_line(s: &str) -> Result<PackagingLine, String> {
    let (id, quantity) = match s.split_once(':') {
        Some((id, quantity)) => (id, parse_id(quantity)?),
        None => (s, 1),
    };
    Ok(PackagingLine {
        packaging_id: PackagingId(parse_id(id)?),
        quantity,
    })
}

#[derive(Debug, Args)]
pub struct IngredientArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    category: Option<String>,
    /// 公斤, 公克, 公升, 毫升, 顆, 包 or their English names
    #[arg(long)]
    unit: String,
    /// Price of one unit
    #[arg(long)]
    price: f64,
}

#[derive(Debug, Args)]
pub struct RecipeArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    category: Option<String>,
    #[arg(long, default_value_t = 1)]
    servings: u32,
    /// Measured finished weight in grams, used instead of the ingredient total
    #[arg(long)]
    total_weight: Option<f64>,
    /// `<INGREDIENT_ID>:<GRAMS>`, repeated per ingredient
    #[arg(long = "line", value_parser = parse_recipe_line)]
    lines: Vec<RecipeLine>,
}

#[derive(Debug, Args)]
pub struct ProductArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    category: Option<String>,
    #[arg(long, default_value_t = 0.0)]
    price: f64,
    /// `<RECIPE_ID>:<QUANTITY>[:weight|serving]`
    #[arg(long = "recipe", value_parser = parse_product_recipe_line)]
    recipes: Vec<ProductRecipeLine>,
    /// `<PACKAGING_ID>[:<QUANTITY>]`
    #[arg(long = "packaging", value_parser = parse_packaging_line)]
    packaging: Vec<PackagingLine>,
}

#[derive(Debug, Args)]
pub struct PackagingArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    cost: f64,
    #[arg(long)]
    note: Option<String>,
}

/// Amounts per 100g of the ingredient.
#[derive(Debug, Args)]
pub struct NutritionArgs {
    /// Must match an ingredient name exactly
    #[arg(long)]
    ingredient: String,
    #[arg(long)]
    calories: f64,
    #[arg(long, default_value_t = 0.0)]
    protein: f64,
    #[arg(long, default_value_t = 0.0)]
    fat: f64,
    #[arg(long, default_value_t = 0.0)]
    saturated_fat: f64,
    #[arg(long, default_value_t = 0.0)]
    trans_fat: f64,
    #[arg(long, default_value_t = 0.0)]
    carbs: f64,
    #[arg(long, default_value_t = 0.0)]
    sugar: f64,
    #[arg(long, default_value_t = 0.0)]
    sodium: f64,
}

#[derive(Debug, Subcommand)]
pub enum Entity {
    Ingredient(IngredientArgs),
    Recipe(RecipeArgs),
    Product(ProductArgs),
    Packaging(PackagingArgs),
    Nutrition(NutritionArgs),
}

impl From<IngredientArgs> for IngredientInput {
    fn from(args: IngredientArgs) -> Self {
        Self {
            name: args.name,
            category: args.category,
            unit: IngredientUnit::import(&args.unit),
            price: args.price,
        }
    }
}

impl From<RecipeArgs> for RecipeInput {
    fn from(args: RecipeArgs) -> Self {
        Self {
            name: args.name,
            category: args.category,
            servings: args.servings,
            total_weight_override: args.total_weight,
            ingredient_lines: args.lines,
        }
    }
}

impl From<ProductArgs> for ProductInput {
    fn from(args: ProductArgs) -> Self {
        Self {
            name: args.name,
            category: args.category,
            selling_price: args.price,
            recipe_lines: args.recipes,
            packaging_lines: args.packaging,
        }
    }
}

impl From<PackagingArgs> for PackagingInput {
    fn from(args: PackagingArgs) -> Self {
        Self {
            name: args.name,
            category: args.category,
            cost: args.cost,
            note: args.note,
        }
    }
}

impl From<NutritionArgs> for NutritionInput {
    fn from(args: NutritionArgs) -> Self {
        Self {
            ingredient_name: args.ingredient,
            per_100g: Nutrients::from_values([
                args.calories,
                args.protein,
                args.fat,
                args.saturated_fat,
                args.trans_fat,
                args.carbs,
                args.sugar,
                args.sodium,
            ]),
        }
    }
}

/// Creates the entity, or replaces every field of entity `id` when one is given. Returns the
/// entity's id.
pub fn apply(
    repository: &mut Repository,
    id: Option<u32>,
    entity: Entity,
) -> Result<u32, ValidationError> {
    use crate::database::models::{NutritionId, ProductId};

    Ok(match (entity, id) {
        (Entity::Ingredient(args), None) => repository.add_ingredient(args.into())?.0,
        (Entity::Ingredient(args), Some(id)) => {
            repository.edit_ingredient(IngredientId(id), args.into())?;
            id
        }
        (Entity::Recipe(args), None) => repository.add_recipe(args.into())?.0,
        (Entity::Recipe(args), Some(id)) => {
            repository.edit_recipe(RecipeId(id), args.into())?;
            id
        }
        (Entity::Product(args), None) => repository.add_product(args.into())?.0,
        (Entity::Product(args), Some(id)) => {
            repository.edit_product(ProductId(id), args.into())?;
            id
        }
        (Entity::Packaging(args), None) => repository.add_packaging(args.into())?.0,
        (Entity::Packaging(args), Some(id)) => {
            repository.edit_packaging(PackagingId(id), args.into())?;
            id
        }
        (Entity::Nutrition(args), None) => repository.add_nutrition(args.into())?.0,
        (Entity::Nutrition(args), Some(id)) => {
            repository.edit_nutrition(NutritionId(id), args.into())?;
            id
        }
    })
}

#[cfg(test)]
use crate::repository::EntityKind;

#[cfg(test)]
#[derive(Debug, clap::Parser)]
struct TestCli {
    #[command(subcommand)]
    entity: Entity,
}

#[cfg(test)]
fn parse(args: &[&str]) -> Entity {
    use clap::Parser as _;
    TestCli::try_parse_from(std::iter::once("test").chain(args.iter().copied()))
        .unwrap()
        .entity
}

#[test]
fn line_syntax() {
    assert_eq!(
        parse_recipe_line("1:500"),
        Ok(RecipeLine {
            ingredient_id: IngredientId(1),
            amount_grams: 500.0
        })
    );
    assert!(parse_recipe_line("1").is_err());
    assert!(parse_recipe_line("x:500").is_err());

    let line = parse_product_recipe_line("2:6:serving").unwrap();
    assert_eq!(line.recipe_id, RecipeId(2));
    assert_eq!(line.quantity_unit, QuantityUnit::ByServing);
    assert_eq!(
        parse_product_recipe_line("2:150").unwrap().quantity_unit,
        QuantityUnit::ByWeight
    );
    assert!(parse_product_recipe_line("2:6:box").is_err());

    assert_eq!(parse_packaging_line("3").unwrap().quantity, 1);
    assert_eq!(parse_packaging_line("3:2").unwrap().quantity, 2);
}

#[test]
fn add_then_edit() {
    let mut repository = Repository::new();
    repository.seed_samples_if_empty();

    let entity = parse(&["recipe", "--name", "海綿蛋糕", "--servings", "6", "--line", "1:500"]);
    let cake = apply(&mut repository, None, entity).unwrap();
    assert_eq!(cake, 1);

    let entity = parse(&[
        "product",
        "--name",
        "6吋海綿蛋糕",
        "--price",
        "380",
        "--recipe",
        "1:6:serving",
        "--packaging",
        "1",
    ]);
    let product = apply(&mut repository, None, entity).unwrap();
    let cost = crate::costing::product_cost(
        repository.product(crate::database::models::ProductId(product)).unwrap(),
        repository.catalog(),
    );
    assert!((cost - 32.5).abs() < 1e-9);

    let entity = parse(&["recipe", "--name", "海綿蛋糕", "--line", "1:0"]);
    assert_eq!(
        apply(&mut repository, Some(cake), entity),
        Err(ValidationError::NoIngredientLines)
    );

    let entity = parse(&["ingredient", "--name", "麵粉", "--unit", "kg", "--price", "40"]);
    assert_eq!(
        apply(&mut repository, Some(99), entity),
        Err(ValidationError::NotFound {
            kind: EntityKind::Ingredients,
            id: 99
        })
    );

    let entity = parse(&["nutrition", "--ingredient", "砂糖", "--calories", "387", "--sugar", "99.8"]);
    apply(&mut repository, None, entity).unwrap();
    assert_eq!(
        repository
            .nutrition_for_ingredient("砂糖")
            .unwrap()
            .per_100g
            .sugar,
        99.8
    );
}
