use crate::application::error::{ErrorReport, HttpError};
use crate::domain::products::{Product, ProductList};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response() -> Response {
    let mut response = render_template_response(
        ErrorTemplate {
            status_code: StatusCode::NOT_FOUND.as_u16(),
            message: "We couldn't find that product.".to_string(),
        },
        StatusCode::NOT_FOUND,
    );
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

pub fn render_unavailable_response(source: &'static str, error: &dyn std::error::Error) -> Response {
    let status = StatusCode::INTERNAL_SERVER_ERROR;
    let mut response = render_template_response(
        ErrorTemplate {
            status_code: status.as_u16(),
            message: "The catalog is temporarily unavailable.".to_string(),
        },
        status,
    );
    ErrorReport::from_error(source, status, error).attach(&mut response);
    response
}

#[derive(Clone)]
pub struct ProductCardView {
    pub id: String,
    pub name: String,
    pub price: String,
    pub category: String,
    pub image_url: String,
    pub in_stock: bool,
}

impl From<&Product> for ProductCardView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            price: product.price.to_string(),
            category: product.category.clone(),
            image_url: product.image_url.clone().unwrap_or_default(),
            in_stock: product.stock > 0,
        }
    }
}

#[derive(Clone)]
pub struct ProductDetailView {
    pub card: ProductCardView,
    pub description: String,
    pub stock: i32,
    pub updated_at: String,
}

impl From<&Product> for ProductDetailView {
    fn from(product: &Product) -> Self {
        Self {
            card: ProductCardView::from(product),
            description: product.description.clone().unwrap_or_default(),
            stock: product.stock,
            updated_at: product.updated_at.date().to_string(),
        }
    }
}

/// Offsets for the previous/next links of a listing page.
#[derive(Clone, Default)]
pub struct PaginationView {
    pub previous: Option<u32>,
    pub next: Option<u32>,
}

impl PaginationView {
    pub fn new(offset: u32, limit: u32, total: u64) -> Self {
        let previous = (offset > 0).then(|| offset.saturating_sub(limit));
        let end = u64::from(offset) + u64::from(limit);
        let next = (end < total).then(|| offset.saturating_add(limit));
        Self { previous, next }
    }

    pub fn is_empty(&self) -> bool {
        self.previous.is_none() && self.next.is_none()
    }
}

#[derive(Clone)]
pub struct ListingView {
    pub heading: String,
    pub base_path: String,
    pub products: Vec<ProductCardView>,
    pub total: u64,
    pub limit: u32,
    pub pagination: PaginationView,
}

impl ListingView {
    pub fn new(
        heading: impl Into<String>,
        base_path: impl Into<String>,
        list: &ProductList,
        limit: u32,
        offset: u32,
    ) -> Self {
        Self {
            heading: heading.into(),
            base_path: base_path.into(),
            products: list.items.iter().map(ProductCardView::from).collect(),
            total: list.total,
            limit,
            pagination: PaginationView::new(offset, limit, list.total),
        }
    }
}

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub products: Vec<ProductCardView>,
}

#[derive(Template)]
#[template(path = "products.html")]
pub struct ListingTemplate {
    pub view: ListingView,
}

#[derive(Template)]
#[template(path = "product.html")]
pub struct ProductTemplate {
    pub product: ProductDetailView,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub status_code: u16,
    pub message: String,
}
