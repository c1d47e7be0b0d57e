// Copyright 2023 Remi Bernotavicius

use crate::costing;
use crate::database::models::Nutrients;
use crate::import::grid;
use crate::repository::{EntityKind, Repository};
use std::path::{Path, PathBuf};

const NUTRIENT_HEADERS: [&str; 8] = [
    "熱量",
    "蛋白質",
    "脂肪",
    "飽和脂肪",
    "反式脂肪",
    "碳水化合物",
    "糖",
    "鈉",
];

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode spreadsheet: {0}")]
    Csv(#[from] csv::Error),
    #[error("there is no import template for {0}")]
    NoTemplate(EntityKind),
}

impl EntityKind {
    pub fn headers(&self) -> Vec<&'static str> {
        let mut headers = match self {
            Self::Ingredients => vec!["原料名稱", "原料分類", "單位", "單價"],
            Self::Recipes => vec!["配方名稱", "配方分類", "總份量", "總重量", "原料及數量"],
            Self::Products => vec!["商品名稱", "商品類別", "售價"],
            Self::Packaging => vec!["包裝名稱", "包裝種類", "包裝成本", "備註"],
            Self::Nutrition => vec!["原料名稱"],
            Self::RecipeNutrition => vec!["配方名稱"],
        };
        if matches!(self, Self::Nutrition | Self::RecipeNutrition) {
            headers.extend(NUTRIENT_HEADERS);
        }
        headers
    }

    pub fn export_file_name(&self) -> String {
        format!("{self}清單.xls")
    }

    pub fn template_file_name(&self) -> String {
        format!("{self}範例.csv")
    }
}

/// Shortest text that reads back as the same number, so whole numbers have no decimal point.
pub fn number_cell(n: f64) -> String {
    n.to_string()
}

fn text_cell(text: &Option<String>) -> String {
    text.clone().unwrap_or_default()
}

fn nutrient_cells(name: &str, nutrients: &Nutrients) -> Vec<String> {
    std::iter::once(name.to_owned())
        .chain(nutrients.values().into_iter().map(number_cell))
        .collect()
}

/// One row of cells per entity of `kind`, in collection order and without the header.
pub fn rows(repository: &Repository, kind: EntityKind) -> Vec<Vec<String>> {
    match kind {
        EntityKind::Ingredients => repository
            .ingredients()
            .iter()
            .map(|i| {
                vec![
                    i.name.clone(),
                    text_cell(&i.category),
                    i.unit.to_string(),
                    number_cell(i.price),
                ]
            })
            .collect(),
        EntityKind::Recipes => repository
            .recipes()
            .iter()
            .map(|r| {
                let ingredients = repository.ingredients();
                let lines: Vec<String> = r
                    .ingredient_lines
                    .iter()
                    .filter_map(|line| {
                        let ingredient = repository.ingredient(line.ingredient_id)?;
                        Some(format!("{}:{}", ingredient.name, line.amount_grams))
                    })
                    .collect();
                vec![
                    r.name.clone(),
                    text_cell(&r.category),
                    r.servings().to_string(),
                    number_cell(costing::effective_weight(r, ingredients)),
                    lines.join(","),
                ]
            })
            .collect(),
        EntityKind::Products => repository
            .products()
            .iter()
            .map(|p| {
                let price = if p.selling_price != 0.0 {
                    number_cell(p.selling_price)
                } else {
                    String::new()
                };
                vec![p.name.clone(), text_cell(&p.category), price]
            })
            .collect(),
        EntityKind::Packaging => repository
            .packaging()
            .iter()
            .map(|p| {
                vec![
                    p.name.clone(),
                    text_cell(&p.category),
                    number_cell(p.cost),
                    text_cell(&p.note),
                ]
            })
            .collect(),
        EntityKind::Nutrition => repository
            .nutrition()
            .iter()
            .map(|n| nutrient_cells(&n.ingredient_name, &n.per_100g))
            .collect(),
        EntityKind::RecipeNutrition => repository
            .recipe_nutrition()
            .iter()
            .map(|n| nutrient_cells(&n.recipe_name, &n.totals))
            .collect(),
    }
}

fn with_headers(kind: EntityKind, rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let header = kind.headers().into_iter().map(String::from).collect();
    std::iter::once(header).chain(rows).collect()
}

pub fn grid(repository: &Repository, kind: EntityKind) -> Vec<Vec<String>> {
    with_headers(kind, rows(repository, kind))
}

/// Case-insensitive substring match against every cell of each row.
pub fn search(repository: &Repository, kind: EntityKind, term: &str) -> Vec<Vec<String>> {
    let term = term.trim().to_lowercase();
    rows(repository, kind)
        .into_iter()
        .filter(|row| row.iter().any(|cell| cell.to_lowercase().contains(&term)))
        .collect()
}

/// Example rows showing the layout an import expects. Recipe templates leave out the
/// ingredient list column.
pub fn template(kind: EntityKind) -> Option<Vec<Vec<String>>> {
    let samples: &[&[&str]] = match kind {
        EntityKind::Ingredients => &[
            &["麵粉", "粉類", "公斤", "35"],
            &["雞蛋", "蛋奶類", "顆", "8"],
            &["奶油", "油脂類", "公斤", "180"],
            &["砂糖", "糖類", "公斤", "25"],
        ],
        EntityKind::Recipes => &[
            &["海綿蛋糕", "蛋糕", "6", "1200"],
            &["巧克力餅乾", "餅乾", "20", "800"],
            &["白吐司", "麵包", "2", "1000"],
        ],
        EntityKind::Products => &[
            &["6吋海綿蛋糕", "蛋糕", "380"],
            &["巧克力餅乾禮盒", "餅乾", "250"],
            &["白吐司", "麵包", "65"],
        ],
        EntityKind::Packaging => &[
            &["蛋糕盒 6吋", "盒子", "15", "白色硬紙盒"],
            &["餅乾袋", "袋子", "2", "透明塑膠袋"],
            &["麵包袋", "袋子", "1.5", "透明塑膠袋"],
        ],
        EntityKind::Nutrition => &[
            &["麵粉", "364", "10.3", "0.98", "0.2", "0", "76", "0.3", "2"],
            &["雞蛋", "155", "13", "11", "3.1", "0", "1.1", "0.6", "124"],
            &["奶油", "717", "0.85", "81", "51", "1.5", "0.06", "0.06", "11"],
        ],
        EntityKind::RecipeNutrition => return None,
    };
    let mut grid = with_headers(kind, vec![]);
    if kind == EntityKind::Recipes {
        grid[0].truncate(4);
    }
    grid.extend(
        samples
            .iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect()),
    );
    Some(grid)
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), ExportError> {
    std::fs::write(path, contents).map_err(|source| ExportError::Io {
        path: path.into(),
        source,
    })
}

/// Writes the full list of `kind` as tab-separated text named like `原料清單.xls`.
pub fn export_to_dir(
    repository: &Repository,
    kind: EntityKind,
    dir: impl AsRef<Path>,
) -> Result<PathBuf, ExportError> {
    let path = dir.as_ref().join(kind.export_file_name());
    let contents = grid::encode(&grid(repository, kind), b'\t')?;
    write_file(&path, &contents)?;
    log::info!("exported {} {kind} rows to {path:?}", repository.len(kind));
    Ok(path)
}

pub fn write_template(kind: EntityKind, dir: impl AsRef<Path>) -> Result<PathBuf, ExportError> {
    let template = template(kind).ok_or(ExportError::NoTemplate(kind))?;
    let path = dir.as_ref().join(kind.template_file_name());
    let mut contents = grid::BOM.to_vec();
    contents.extend(grid::encode(&template, b',')?);
    write_file(&path, &contents)?;
    log::info!("wrote {kind} template to {path:?}");
    Ok(path)
}

#[cfg(test)]
use crate::database::models::{IngredientId, RecipeLine};
#[cfg(test)]
use crate::repository::{ProductInput, RecipeInput};

#[cfg(test)]
fn sample_repository() -> Repository {
    let mut repository = Repository::new();
    repository.seed_samples_if_empty();
    repository
        .add_recipe(RecipeInput {
            name: "海綿蛋糕".into(),
            category: Some("蛋糕".into()),
            servings: 6,
            total_weight_override: None,
            ingredient_lines: vec![
                RecipeLine {
                    ingredient_id: IngredientId(1),
                    amount_grams: 500.0,
                },
                RecipeLine {
                    ingredient_id: IngredientId(3),
                    amount_grams: 120.5,
                },
            ],
        })
        .unwrap();
    repository
}

#[test]
fn headers_per_kind() {
    for kind in EntityKind::iter() {
        let headers = kind.headers();
        assert!(!headers.is_empty());
        if let Some(template) = template(kind) {
            assert!(template[0].len() <= headers.len());
        }
    }
    assert_eq!(EntityKind::Nutrition.headers().len(), 9);
    assert_eq!(EntityKind::RecipeNutrition.headers()[0], "配方名稱");
    assert_eq!(EntityKind::Ingredients.export_file_name(), "原料清單.xls");
    assert_eq!(EntityKind::Packaging.template_file_name(), "包裝範例.csv");
}

#[test]
fn number_cells_are_shortest() {
    assert_eq!(number_cell(35.0), "35");
    assert_eq!(number_cell(17.5), "17.5");
    assert_eq!(number_cell(0.98), "0.98");
}

#[test]
fn recipe_rows_flatten_lines() {
    let repository = sample_repository();
    let rows = rows(&repository, EntityKind::Recipes);
    assert_eq!(
        rows,
        vec![vec![
            "海綿蛋糕".to_owned(),
            "蛋糕".into(),
            "6".into(),
            "620.5".into(),
            "麵粉:500,奶油:120.5".into(),
        ]]
    );
}

#[test]
fn unpriced_products_export_an_empty_cell() {
    let mut repository = sample_repository();
    let recipe_lines = vec![crate::database::models::ProductRecipeLine {
        recipe_id: crate::database::models::RecipeId(1),
        quantity: 1.0,
        quantity_unit: Default::default(),
    }];
    repository
        .add_product(ProductInput {
            name: "試吃".into(),
            category: None,
            selling_price: 0.0,
            recipe_lines,
            packaging_lines: vec![],
        })
        .unwrap();
    assert_eq!(
        rows(&repository, EntityKind::Products),
        vec![vec!["試吃".to_owned(), String::new(), String::new()]]
    );
}

#[test]
fn search_is_case_insensitive() {
    let mut repository = sample_repository();
    repository
        .upsert_packaging(crate::repository::PackagingInput {
            name: "Gift Box".into(),
            category: None,
            cost: 30.0,
            note: None,
        })
        .unwrap();
    assert_eq!(search(&repository, EntityKind::Packaging, "gift").len(), 1);
    assert_eq!(search(&repository, EntityKind::Packaging, "盒").len(), 2);
    assert_eq!(search(&repository, EntityKind::Ingredients, "蛋奶").len(), 2);
    assert_eq!(search(&repository, EntityKind::Ingredients, "").len(), 5);
    assert!(search(&repository, EntityKind::Recipes, "巧克力").is_empty());
}

#[test]
fn exported_file_imports_back() {
    let dir = tempfile::tempdir().unwrap();
    let repository = sample_repository();
    let path = export_to_dir(&repository, EntityKind::Nutrition, dir.path()).unwrap();
    assert_eq!(path.file_name().unwrap(), "營養成分清單.xls");

    let mut fresh = Repository::new();
    let report = crate::import::import_path(&mut fresh, EntityKind::Nutrition, &path).unwrap();
    assert_eq!(report.succeeded, 3);
    assert_eq!(fresh.nutrition(), repository.nutrition());
}

#[test]
fn templates_import_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let mut repository = Repository::new();
    for kind in EntityKind::iter().filter(|k| !k.is_derived()) {
        let path = write_template(kind, dir.path()).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(grid::BOM));

        let report = crate::import::import_path(&mut repository, kind, &path).unwrap();
        assert_eq!(report.failed, 0, "{kind}");
        assert!(report.succeeded >= 3, "{kind}");
    }
    assert!(matches!(
        write_template(EntityKind::RecipeNutrition, dir.path()),
        Err(ExportError::NoTemplate(_))
    ));
}
