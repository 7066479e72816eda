use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::CourseLevel;

/// Duration filter buckets, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationBucket {
    ExtraShort,
    Short,
    Medium,
    Long,
    ExtraLong,
}

impl DurationBucket {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "extraShort" => Some(Self::ExtraShort),
            "short" => Some(Self::Short),
            "medium" => Some(Self::Medium),
            "long" => Some(Self::Long),
            "extraLong" => Some(Self::ExtraLong),
            _ => None,
        }
    }

    /// Exclusive lower bound and inclusive upper bound. `ExtraShort` starts at 0 inclusive.
    pub fn bounds(self) -> (Option<i32>, Option<i32>) {
        match self {
            Self::ExtraShort => (None, Some(120)),
            Self::Short => (Some(120), Some(300)),
            Self::Medium => (Some(300), Some(600)),
            Self::Long => (Some(600), Some(1200)),
            Self::ExtraLong => (Some(1200), None),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CatalogSort {
    #[default]
    Title,
    Rating,
    Reviews,
    Newest,
}

impl CatalogSort {
    fn order_by(self) -> &'static str {
        match self {
            Self::Title => " ORDER BY c.title ASC",
            Self::Rating => " ORDER BY c.avg_rating DESC, c.title ASC",
            Self::Reviews => " ORDER BY c.review_count DESC, c.title ASC",
            Self::Newest => " ORDER BY c.created_at DESC",
        }
    }
}

/// CatalogFilter
///
/// The parsed `GET /courses` query string. `level` and `duration` may repeat, which is why
/// this is built from raw key/value pairs rather than a derived struct. Unknown keys and
/// unparsable values are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogFilter {
    pub keywords: Vec<String>,
    pub category: Option<String>,
    pub levels: Vec<CourseLevel>,
    pub durations: Vec<DurationBucket>,
    pub min_rating: Option<f64>,
    pub sort: CatalogSort,
}

impl CatalogFilter {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut filter = CatalogFilter::default();

        for (key, value) in pairs {
            let value = value.trim();
            match key.as_str() {
                "search" => {
                    filter.keywords = value.split_whitespace().map(str::to_string).collect();
                }
                "category" if !value.is_empty() => filter.category = Some(value.to_string()),
                "level" => {
                    let level = match value {
                        "BEGINNER" => Some(CourseLevel::Beginner),
                        "INTERMEDIATE" => Some(CourseLevel::Intermediate),
                        "ADVANCED" => Some(CourseLevel::Advanced),
                        _ => None,
                    };
                    filter.levels.extend(level);
                }
                "duration" => filter.durations.extend(DurationBucket::parse(value)),
                "rating" => filter.min_rating = value.parse().ok(),
                "sort" => {
                    filter.sort = match value {
                        "rating" => CatalogSort::Rating,
                        "review" => CatalogSort::Reviews,
                        "newest" => CatalogSort::Newest,
                        _ => CatalogSort::Title,
                    }
                }
                _ => {}
            }
        }

        filter
    }

    /// Builds the listing query. Only published courses are ever returned; every user-supplied
    /// value is bound, never interpolated.
    pub fn build_query(&self, viewer: Option<Uuid>) -> QueryBuilder<'static, Postgres> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT
                c.id, c.title, c.slug, c.description, c.level, c.duration, c.thumbnail_url,
                c.avg_rating, c.review_count, c.category_id,
                cat.name AS category_name, cat.slug AS category_slug,
                EXISTS (
                    SELECT 1 FROM favorites f WHERE f.course_id = c.id AND f.user_id = "#,
        );
        // A nil uuid never matches a user, so anonymous callers see no favorites.
        builder.push_bind(viewer.unwrap_or(Uuid::nil()));
        builder.push(
            r#"
                ) AS is_favorite
            FROM courses c
            JOIN categories cat ON cat.id = c.category_id
            WHERE c.is_published = true"#,
        );

        for word in &self.keywords {
            let pattern = format!("%{}%", escape_like(word));
            builder.push(" AND (c.title ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR c.description ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }

        if let Some(category) = &self.category {
            builder.push(" AND cat.slug = ");
            builder.push_bind(category.clone());
        }

        if !self.levels.is_empty() {
            builder.push(" AND c.level = ANY(");
            builder.push_bind(self.levels.clone());
            builder.push(")");
        }

        if !self.durations.is_empty() {
            builder.push(" AND (");
            for (index, bucket) in self.durations.iter().enumerate() {
                if index > 0 {
                    builder.push(" OR ");
                }
                builder.push("(");
                match bucket.bounds() {
                    (None, Some(upper)) => {
                        builder.push("c.duration >= 0 AND c.duration <= ");
                        builder.push_bind(upper);
                    }
                    (Some(lower), Some(upper)) => {
                        builder.push("c.duration > ");
                        builder.push_bind(lower);
                        builder.push(" AND c.duration <= ");
                        builder.push_bind(upper);
                    }
                    (Some(lower), None) => {
                        builder.push("c.duration > ");
                        builder.push_bind(lower);
                    }
                    (None, None) => {
                        builder.push("true");
                    }
                }
                builder.push(")");
            }
            builder.push(")");
        }

        if let Some(rating) = self.min_rating {
            builder.push(" AND c.avg_rating >= ");
            builder.push_bind(rating);
        }

        builder.push(self.sort.order_by());
        builder
    }
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_repeated_and_scalar_params() {
        let filter = CatalogFilter::from_pairs(&pairs(&[
            ("search", "  python   data "),
            ("category", "data-ai"),
            ("level", "BEGINNER"),
            ("level", "ADVANCED"),
            ("level", "EXPERT"),
            ("duration", "short"),
            ("duration", "nonsense"),
            ("rating", "4.5"),
            ("sort", "newest"),
        ]));

        assert_eq!(filter.keywords, vec!["python", "data"]);
        assert_eq!(filter.category.as_deref(), Some("data-ai"));
        assert_eq!(
            filter.levels,
            vec![CourseLevel::Beginner, CourseLevel::Advanced]
        );
        assert_eq!(filter.durations, vec![DurationBucket::Short]);
        assert_eq!(filter.min_rating, Some(4.5));
        assert_eq!(filter.sort, CatalogSort::Newest);
    }

    #[test]
    fn duration_buckets_tile_without_gaps() {
        let buckets = [
            DurationBucket::ExtraShort,
            DurationBucket::Short,
            DurationBucket::Medium,
            DurationBucket::Long,
            DurationBucket::ExtraLong,
        ];

        assert_eq!(DurationBucket::ExtraShort.bounds(), (None, Some(120)));
        assert_eq!(DurationBucket::ExtraLong.bounds(), (Some(1200), None));
        // Each bucket's exclusive lower bound is the previous bucket's inclusive upper bound.
        for pair in buckets.windows(2) {
            assert_eq!(pair[0].bounds().1, pair[1].bounds().0, "{:?}", pair);
        }
    }

    #[test]
    fn default_query_only_lists_published_courses_by_title() {
        let builder = CatalogFilter::default().build_query(None);
        let sql = builder.sql();
        assert!(sql.contains("c.is_published = true"));
        assert!(sql.trim_end().ends_with("ORDER BY c.title ASC"));
        assert!(!sql.contains("ILIKE"));
    }

    #[test]
    fn every_keyword_narrows_the_search() {
        let filter = CatalogFilter::from_pairs(&pairs(&[("search", "rust async")]));
        let builder = filter.build_query(Some(Uuid::new_v4()));
        assert_eq!(builder.sql().matches("c.title ILIKE").count(), 2);
    }

    #[test]
    fn durations_are_or_ed_together() {
        let filter = CatalogFilter::from_pairs(&pairs(&[
            ("duration", "extraShort"),
            ("duration", "extraLong"),
        ]));
        let builder = filter.build_query(None);
        let sql = builder.sql();
        assert!(sql.contains("c.duration >= 0 AND c.duration <= "));
        assert!(sql.contains(") OR ("));
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("100%_done"), "100\\%\\_done");
    }
}
