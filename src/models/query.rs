use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    repositories::filter::{Filter, Operator, Relation},
    Error, Result,
};

pub const PER_PAGE: i64 = 15;
/// Highest page whose offset still fits in an `i64`.
const MAX_PAGE: i64 = i64::MAX / PER_PAGE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl Pagination {
    pub fn new(page: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).clamp(1, MAX_PAGE),
            per_page: PER_PAGE,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        (total + self.per_page - 1) / self.per_page
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        Self {
            items,
            total,
            page: pagination.page,
            per_page: pagination.per_page,
            total_pages: pagination.total_pages(total),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            total_pages: self.total_pages,
        }
    }
}

/// Query string of `GET /users`.
#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct UserListQuery {
    pub page: Option<i64>,
    pub name: Option<String>,
    pub email: Option<String>,
    /// Substring match on name or email.
    pub search: Option<String>,
    pub created_on: Option<NaiveDate>,
    #[validate(range(min = 1, max = 12, message = "The created_month must be between 1 and 12."))]
    pub created_month: Option<i32>,
    pub created_year: Option<i32>,
    pub created_from: Option<NaiveDate>,
    pub created_to: Option<NaiveDate>,
    /// Comma separated ids.
    pub ids: Option<String>,
    pub exclude_ids: Option<String>,
    pub verified: Option<bool>,
    pub has_posts: Option<bool>,
    /// Users with strictly more posts than this.
    #[validate(range(min = 0, message = "The min_posts must be at least 0."))]
    pub min_posts: Option<i64>,
    pub post_title: Option<String>,
}

impl UserListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page)
    }

    pub fn to_filter(&self) -> Result<Filter> {
        let mut filter = Filter::new();

        if let Some(name) = &self.name {
            filter = filter.where_eq("name", name.as_str());
        }
        if let Some(email) = &self.email {
            filter = filter.where_eq("email", email.as_str());
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", escape_like(search));
            filter = filter.where_group(|q| {
                q.where_cmp("name", Operator::ILike, pattern.as_str())
                    .or_where_cmp("email", Operator::ILike, pattern.as_str())
            });
        }
        if let Some(day) = self.created_on {
            filter = filter.where_date("created_at", day);
        }
        if let Some(month) = self.created_month {
            filter = filter.where_month("created_at", month);
        }
        if let Some(year) = self.created_year {
            filter = filter.where_year("created_at", year);
        }
        filter = match (self.created_from, self.created_to) {
            (Some(from), Some(to)) => filter.where_between("created_at::date", from, to),
            (Some(from), None) => filter.where_cmp("created_at::date", Operator::Gte, from),
            (None, Some(to)) => filter.where_cmp("created_at::date", Operator::Lte, to),
            (None, None) => filter,
        };
        if let Some(ids) = &self.ids {
            filter = filter.where_in("id", parse_ids(ids)?);
        }
        if let Some(ids) = &self.exclude_ids {
            filter = filter.where_not_in("id", parse_ids(ids)?);
        }
        filter = match self.verified {
            Some(true) => filter.where_not_null("email_verified_at"),
            Some(false) => filter.where_null("email_verified_at"),
            None => filter,
        };
        filter = match self.has_posts {
            Some(true) => filter.has(Relation::Posts),
            Some(false) => filter.has_count(Relation::Posts, Operator::Eq, 0),
            None => filter,
        };
        if let Some(min) = self.min_posts {
            filter = filter.has_count(Relation::Posts, Operator::Gt, min);
        }
        if let Some(title) = &self.post_title {
            filter = filter.where_has(Relation::Posts, |q| {
                q.where_eq("posts.title", title.as_str())
            });
        }

        Ok(filter)
    }
}

/// Query string of `GET /posts`.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PostListQuery {
    pub page: Option<i64>,
    /// Substring match on title or content.
    pub search: Option<String>,
    pub user_id: Option<Uuid>,
}

impl PostListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page)
    }

    pub fn to_filter(&self) -> Filter {
        let mut filter = Filter::new();

        if let Some(user_id) = self.user_id {
            filter = filter.where_eq("user_id", user_id);
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", escape_like(search));
            filter = filter.where_group(|q| {
                q.where_cmp("title", Operator::ILike, pattern.as_str())
                    .or_where_cmp("content", Operator::ILike, pattern.as_str())
            });
        }

        filter
    }
}

fn parse_ids(raw: &str) -> Result<Vec<Uuid>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Uuid::parse_str(s).map_err(|_| Error::BadRequest(format!("Invalid id: {}", s))))
        .collect()
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
