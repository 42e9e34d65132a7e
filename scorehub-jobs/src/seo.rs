//! Sitemap and robots.txt generation for the storefront.

use std::path::PathBuf;

use chrono::Utc;
use scorehub_job_queue::{async_trait, JobData, JobQueueError, QueueWorker};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{parse_payload, JobError};
use crate::{job_types, queues};

pub const SITEMAP_FILE: &str = "sitemap.xml";
pub const ROBOTS_FILE: &str = "robots.txt";

#[derive(Debug, Default, Deserialize)]
struct SitemapPayload {
    /// Extra routes, e.g. product pages, appended to the static set.
    #[serde(default)]
    routes: Vec<String>,
}

/// Worker for the `seo` queue.
#[derive(Debug, Clone)]
pub struct SeoWorker {
    base_url: String,
    public_dir: PathBuf,
    routes: Vec<String>,
}

impl SeoWorker {
    pub fn new(base_url: impl Into<String>, public_dir: impl Into<PathBuf>, routes: Vec<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            public_dir: public_dir.into(),
            routes,
        }
    }

    pub fn sitemap(&self, extra: &[String]) -> String {
        let lastmod = Utc::now().format("%Y-%m-%d");
        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
        );
        let mut seen = std::collections::HashSet::new();
        for route in self.routes.iter().chain(extra) {
            if !seen.insert(route.as_str()) {
                continue;
            }
            xml.push_str(&format!(
                "  <url><loc>{}{}</loc><lastmod>{}</lastmod></url>\n",
                escape_xml(&self.base_url),
                escape_xml(route),
                lastmod
            ));
        }
        xml.push_str("</urlset>\n");
        xml
    }

    pub fn robots(&self) -> String {
        format!(
            "User-agent: *\nAllow: /\nDisallow: /admin\nDisallow: /api\n\nSitemap: {}/{}\n",
            self.base_url, SITEMAP_FILE
        )
    }

    async fn generate(&self, extra: &[String]) -> Result<(), JobError> {
        tokio::fs::create_dir_all(&self.public_dir).await?;
        tokio::fs::write(self.public_dir.join(SITEMAP_FILE), self.sitemap(extra)).await?;
        tokio::fs::write(self.public_dir.join(ROBOTS_FILE), self.robots()).await?;
        info!(
            dir = %self.public_dir.display(),
            routes = self.routes.len() + extra.len(),
            "sitemap and robots.txt regenerated"
        );
        Ok(())
    }

    async fn health_check(&self) -> Result<(), JobError> {
        let sitemap = self.public_dir.join(SITEMAP_FILE);
        let robots = self.public_dir.join(ROBOTS_FILE);
        for path in [&sitemap, &robots] {
            if !tokio::fs::try_exists(path).await? {
                warn!(path = %path.display(), "seo file missing");
                return Err(JobError::MissingFile(path.clone()));
            }
        }
        let contents = tokio::fs::read_to_string(&sitemap).await?;
        if !contents.contains("<urlset") {
            return Err(JobError::Failed(format!(
                "{} is not a sitemap",
                sitemap.display()
            )));
        }
        info!("seo health check passed");
        Ok(())
    }
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[async_trait]
impl QueueWorker for SeoWorker {
    fn queue(&self) -> &str {
        queues::SEO
    }

    async fn execute(&self, job: JobData) -> Result<(), JobQueueError> {
        match job.job_type.as_str() {
            job_types::GENERATE_SITEMAP => {
                let payload: SitemapPayload = if job.data.is_null() {
                    SitemapPayload::default()
                } else {
                    parse_payload(job.data)?
                };
                self.generate(&payload.routes).await?;
            }
            job_types::SEO_HEALTH_CHECK => self.health_check().await?,
            other => return Err(JobError::UnsupportedType(other.to_string()).into()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn worker(dir: &std::path::Path) -> SeoWorker {
        SeoWorker::new(
            "https://scores.example/",
            dir.join("public"),
            vec!["/".into(), "/sheet-music".into()],
        )
    }

    #[tokio::test]
    async fn generates_then_passes_health_check() {
        let dir = tempfile::tempdir().unwrap();
        let worker = worker(dir.path());

        let err = worker
            .execute(JobData::new(job_types::SEO_HEALTH_CHECK, json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, JobQueueError::ExecutionFailed(_)));

        worker
            .execute(JobData::new(
                job_types::GENERATE_SITEMAP,
                json!({"routes": ["/sheet-music/bach&sons", "/"]}),
            ))
            .await
            .unwrap();

        let sitemap = std::fs::read_to_string(dir.path().join("public/sitemap.xml")).unwrap();
        assert!(sitemap.contains("<loc>https://scores.example/sheet-music</loc>"));
        assert!(sitemap.contains("<loc>https://scores.example/sheet-music/bach&amp;sons</loc>"));
        assert_eq!(sitemap.matches("<loc>https://scores.example/</loc>").count(), 1);

        let robots = std::fs::read_to_string(dir.path().join("public/robots.txt")).unwrap();
        assert!(robots.ends_with("Sitemap: https://scores.example/sitemap.xml\n"));

        worker
            .execute(JobData::new(job_types::SEO_HEALTH_CHECK, json!({})))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_job_type_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = worker(dir.path())
            .execute(JobData::new("submit-to-search-engines", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, JobQueueError::InvalidPayload(_)));
    }
}
