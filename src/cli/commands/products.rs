//! Product cache and listing commands

use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use serde::Serialize;

use crate::api::{ApiClient, ProductListParams, Sorting};
use crate::cli::output::{OutputFormat, print_error, print_formatted, print_success};
use crate::config::Config;
use crate::db::Database;
use crate::models::{Category, Product};

#[derive(Subcommand, Debug)]
pub enum ProductsCommands {
    /// List products from the cache (or the backend with --remote)
    List(ListArgs),

    /// Count products
    Count {
        /// Ask the backend instead of the cache
        #[arg(long)]
        remote: bool,
    },

    /// Show one product
    Show {
        id: i64,

        /// Fetch from the backend instead of the cache
        #[arg(long)]
        remote: bool,
    },

    /// Download product pages from the backend into the cache
    Sync {
        /// Products per request
        #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u32).range(1..))]
        page_size: u32,

        /// Stop after this many pages
        #[arg(long)]
        max_pages: Option<u32>,

        /// Only refresh products that are already cached
        #[arg(long)]
        refresh_only: bool,
    },

    /// Remove one product from the cache
    Delete { id: i64 },

    /// Remove every cached product
    Clear,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(long, default_value_t = 0)]
    offset: usize,

    #[arg(long, default_value_t = 20)]
    limit: usize,

    #[arg(long, value_enum, default_value_t = ListOrder::Newest)]
    order: ListOrder,

    /// Every cached product, ignoring --offset and --limit
    #[arg(long, conflicts_with_all = ["offset", "limit", "remote"])]
    all: bool,

    /// Query the backend instead of the cache
    #[arg(long)]
    remote: bool,

    /// Only this category (backend only; repeatable)
    #[arg(long = "category", value_name = "KEY", requires = "remote")]
    categories: Vec<String>,

    /// Company name contains (backend only)
    #[arg(long, requires = "remote")]
    query: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ListOrder {
    /// Most recently updated first
    Newest,
    /// Least recently updated first
    Oldest,
    /// By id (cache only)
    Id,
}

#[derive(Serialize)]
struct CountResult {
    source: &'static str,
    count: usize,
}

#[derive(Serialize)]
struct SyncResult {
    pages: u32,
    fetched: usize,
    stored: usize,
    cached: usize,
}

pub async fn run(command: ProductsCommands, format: OutputFormat, quiet: bool) -> Result<()> {
    match command {
        ProductsCommands::List(args) => list(args, format).await,
        ProductsCommands::Count { remote } => count(remote, format).await,
        ProductsCommands::Show { id, remote } => show(id, remote, format).await,
        ProductsCommands::Sync {
            page_size,
            max_pages,
            refresh_only,
        } => sync(page_size as usize, max_pages, refresh_only, format, quiet).await,
        ProductsCommands::Delete { id } => delete(id, quiet).await,
        ProductsCommands::Clear => clear(quiet).await,
    }
}

fn client() -> Result<ApiClient> {
    let config = Config::load()?;
    ApiClient::new(&config.api)
}

async fn list(args: ListArgs, format: OutputFormat) -> Result<()> {
    let products = if args.remote {
        let params = list_params(&args)?;
        client()?.products(args.offset, args.limit, Some(&params)).await?
    } else {
        let db = Database::open()?;
        match args.order {
            _ if args.all => db.all()?,
            ListOrder::Newest => db.select_newest(args.offset, args.limit)?,
            ListOrder::Oldest => db.select_oldest(args.offset, args.limit)?,
            ListOrder::Id => db.select(args.offset, args.limit)?,
        }
    };

    print_formatted(&products, format, |products| {
        if products.is_empty() {
            return "No products".to_string();
        }
        products.iter().map(format_row).collect::<Vec<_>>().join("\n")
    });
    Ok(())
}

fn list_params(args: &ListArgs) -> Result<ProductListParams> {
    let categories = args
        .categories
        .iter()
        .map(|key| match Category::from_key(key) {
            Category::Uncategorized if key != Category::Uncategorized.key() => {
                anyhow::bail!("Unknown category: {}", key)
            }
            category => Ok(category),
        })
        .collect::<Result<Vec<_>>>()?;

    let sorting = match args.order {
        ListOrder::Newest => Sorting::Newest,
        ListOrder::Oldest => Sorting::Oldest,
        ListOrder::Id => anyhow::bail!("The backend only sorts by date"),
    };

    Ok(ProductListParams {
        sorting,
        categories,
        query: args.query.clone(),
    })
}

async fn count(remote: bool, format: OutputFormat) -> Result<()> {
    let result = if remote {
        CountResult {
            source: "backend",
            count: client()?.product_count().await?,
        }
    } else {
        CountResult {
            source: "cache",
            count: Database::open()?.count()?,
        }
    };

    print_formatted(&result, format, |r| format!("{} products ({})", r.count, r.source));
    Ok(())
}

async fn show(id: i64, remote: bool, format: OutputFormat) -> Result<()> {
    let product = if remote {
        Some(client()?.find_product(id).await?)
    } else {
        Database::open()?.one(id)?
    };

    match product {
        Some(product) => print_formatted(&product, format, format_details),
        None => print_error(&format!("Product {} is not cached", id)),
    }
    Ok(())
}

async fn sync(
    page_size: usize,
    max_pages: Option<u32>,
    refresh_only: bool,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    let client = client()?;
    let db = Database::open()?;

    let mut result = SyncResult {
        pages: 0,
        fetched: 0,
        stored: 0,
        cached: 0,
    };

    while max_pages.is_none_or(|max| result.pages < max) {
        let page = client
            .products(result.fetched, page_size, None)
            .await
            .with_context(|| format!("Failed to fetch page {}", result.pages + 1))?;

        result.pages += 1;
        result.fetched += page.len();
        result.stored += if refresh_only {
            db.update(&page)?
        } else {
            db.insert(&page)?;
            page.len()
        };

        if !quiet && format == OutputFormat::Text {
            println!("Page {}: {} products", result.pages, page.len());
        }
        if page.len() < page_size {
            break;
        }
    }

    result.cached = db.count()?;
    match format {
        OutputFormat::Json => print_formatted(&result, format, |_| String::new()),
        OutputFormat::Text => print_success(
            &format!(
                "Fetched {} products in {} pages, stored {} ({} cached)",
                result.fetched, result.pages, result.stored, result.cached
            ),
            quiet,
        ),
    }
    Ok(())
}

async fn delete(id: i64, quiet: bool) -> Result<()> {
    if Database::open()?.delete(id)? {
        print_success(&format!("Removed product {}", id), quiet);
    } else {
        print_error(&format!("Product {} is not cached", id));
    }
    Ok(())
}

async fn clear(quiet: bool) -> Result<()> {
    let removed = Database::open()?.clear()?;
    print_success(&format!("Removed {} cached products", removed), quiet);
    Ok(())
}

fn format_row(product: &Product) -> String {
    format!(
        "{:>6}  {:<32}  {:<20}  {}",
        product.id,
        product.company,
        product.category.key(),
        product.updated_at.format("%Y-%m-%d %H:%M")
    )
}

fn format_details(product: &Product) -> String {
    let mut lines = vec![
        format!("Id:        {}", product.id),
        format!("Company:   {}", product.company),
        format!("Category:  {}", product.category.key()),
        format!("Updated:   {}", product.updated_at.to_rfc3339()),
    ];
    if let Some(logo) = &product.logo_url {
        lines.push(format!("Logo:      {}", logo));
    }
    if let Some(summary) = &product.summary {
        lines.push(String::new());
        lines.push(summary.clone());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::product;

    fn args(categories: &[&str], order: ListOrder) -> ListArgs {
        ListArgs {
            offset: 0,
            limit: 20,
            order,
            all: false,
            remote: true,
            categories: categories.iter().map(|c| c.to_string()).collect(),
            query: Some("acme".to_string()),
        }
    }

    #[test]
    fn test_list_params_from_args() {
        let params = list_params(&args(&["ipo", "venture_capital"], ListOrder::Oldest)).unwrap();
        assert_eq!(params.sorting, Sorting::Oldest);
        assert_eq!(params.categories, vec![Category::Ipo, Category::VentureCapital]);
        assert_eq!(params.query.as_deref(), Some("acme"));
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let err = list_params(&args(&["moonshots"], ListOrder::Newest)).unwrap_err();
        assert!(err.to_string().contains("moonshots"));

        let params = list_params(&args(&["uncategorized"], ListOrder::Newest)).unwrap();
        assert_eq!(params.categories, vec![Category::Uncategorized]);
    }

    #[test]
    fn test_backend_cannot_sort_by_id() {
        assert!(list_params(&args(&[], ListOrder::Id)).is_err());
    }

    #[test]
    fn test_details_include_optional_fields() {
        let mut p = product(4, "Pied Piper");
        assert_eq!(format_details(&p).lines().count(), 4);

        p.summary = Some("Compression".to_string());
        p.logo_url = Some("https://cdn/pp.png".to_string());
        let text = format_details(&p);
        assert!(text.contains("Logo:      https://cdn/pp.png"));
        assert!(text.ends_with("Compression"));
    }
}
