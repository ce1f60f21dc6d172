//! The named checks every test reaches for, built from one settings profile.

use std::sync::Arc;

use reqwest::header::{HeaderValue, USER_AGENT};
use spectrum_common::{Settings, GOOGLEBOT_USER_AGENT};
use spectrum_http::{ClientOptions, HeaderMap, RetryPolicy, RetryingClient};
use spectrum_poll::{Error, Result};

use crate::api::ApiCheck;
use crate::bucket::{BucketFileCheck, ObjectListing};
use crate::dashboard::DashboardArticleCheck;
use crate::feed::ObserverCheck;
use crate::http_page::{GithubCheck, HttpCheck};
use crate::journal::JournalCheck;
use crate::lax::LaxArticleCheck;
use crate::mail::MailcatcherCheck;

pub const JOURNAL_GENERIC_PATHS: [&str; 11] = [
    "/about",
    "/about/early-career",
    "/about/innovation",
    "/about/openness",
    "/about/peer-review",
    "/alerts",
    "/contact",
    "/for-the-press",
    "/resources",
    "/terms",
    "/who-we-work-with",
];

pub const JOURNAL_LISTING_PATHS: [&str; 7] = [
    "/annual-reports",
    "/articles/correction",
    "/collections",
    "/community",
    "/inside-elife",
    "/labs",
    "/podcast",
];

pub const JOURNAL_LISTING_OF_LISTING_PATHS: [&str; 2] = ["/archive/2016", "/subjects"];

pub struct Catalog {
    pub archive: BucketFileCheck,
    pub personalised_covers_a4: BucketFileCheck,
    pub personalised_covers_letter: BucketFileCheck,
    pub images_published_cdn_bucket: BucketFileCheck,
    pub xml_published_cdn_bucket: BucketFileCheck,
    pub pdf_published_cdn_bucket: BucketFileCheck,
    pub digest_jpg_published_cdn_bucket: BucketFileCheck,
    pub packaging_bucket_outbox: BucketFileCheck,
    pub packaging_bucket_batch: BucketFileCheck,
    pub packaging_bucket_poa_zip: BucketFileCheck,
    pub packaging_bucket_poa_xml: BucketFileCheck,
    pub packaging_bucket_poa_pdf: BucketFileCheck,
    pub bot_internal_digest_outbox_doc: BucketFileCheck,
    pub bot_internal_digest_outbox_jpg: BucketFileCheck,
    pub dashboard: DashboardArticleCheck,
    pub lax: LaxArticleCheck,
    pub api: ApiCheck,
    /// Allowed to see restricted content.
    pub api_super_user: ApiCheck,
    pub journal: JournalCheck,
    pub journal_cdn: JournalCheck,
    pub journal_googlebot: JournalCheck,
    pub cdn_xml: HttpCheck,
    pub github_xml: GithubCheck,
    pub observer: ObserverCheck,
    pub pubmed: HttpCheck,
    pub bot_emails: MailcatcherCheck,
}

impl Catalog {
    pub fn from_settings(settings: &Settings, storage: Arc<dyn ObjectListing>) -> Result<Self> {
        let policy = RetryPolicy::new(settings.retry_statuses.iter().copied());
        let options = ClientOptions {
            accept_invalid_certs: settings.accept_invalid_certs,
            ..ClientOptions::default()
        };
        let http = RetryingClient::with_options(policy.clone(), options.clone()).map_err(Error::http)?;

        let bucket = |name: &str, key: &str, prefix: &str| {
            BucketFileCheck::new(storage.clone(), name, key, Some(prefix))
        };
        let published = settings.bucket_published.as_str();
        let packaging = settings.bucket_packaging.as_str();
        let configuration = settings.bucket_configuration.as_str();

        let journal_cdn = JournalCheck::new(&settings.journal_cdn_host, policy.clone(), options.clone())?;
        let mut googlebot = HeaderMap::new();
        googlebot.insert(USER_AGENT, HeaderValue::from_static(GOOGLEBOT_USER_AGENT));

        Ok(Self {
            archive: bucket(
                settings.bucket_archive.as_str(),
                // {{12}} is the regex quantifier {12}, not a placeholder
                "elife-{id}-(poa|vor)-v{version}-20[0-9]{{12}}.zip",
                "elife-{id}-",
            ),
            personalised_covers_a4: bucket(settings.bucket_covers.as_str(), "{id}-cover-a4.pdf", "{id}-"),
            personalised_covers_letter: bucket(settings.bucket_covers.as_str(), "{id}-cover-letter.pdf", "{id}-"),
            images_published_cdn_bucket: bucket(
                published,
                "articles/{id}/elife-{id}-{figure_name}-v{version}.jpg",
                "articles/{id}/elife-{id}-{figure_name}-v{version}.jpg",
            ),
            xml_published_cdn_bucket: bucket(
                published,
                "articles/{id}/elife-{id}-v{version}.xml",
                "articles/{id}/elife-{id}-v{version}.xml",
            ),
            pdf_published_cdn_bucket: bucket(
                published,
                "articles/{id}/elife-{id}-v{version}.pdf",
                "articles/{id}/elife-{id}-v{version}.pdf",
            ),
            digest_jpg_published_cdn_bucket: bucket(
                published,
                "digests/{id}/digest-{id}.jpg",
                "digests/{id}/digest-{id}.jpg",
            ),
            packaging_bucket_outbox: bucket(
                packaging,
                "{vendor}/outbox/elife{id}.xml",
                "{vendor}/outbox/elife{id}.xml",
            ),
            packaging_bucket_batch: bucket(
                packaging,
                r"{vendor}/published/20[0-9]{{6}}/batch/(elife-.*\.xml)",
                "{vendor}/published/",
            ),
            packaging_bucket_poa_zip: bucket(
                packaging,
                "outbox/elife_poa_e{id}_ds.zip",
                "outbox/elife_poa_e{id}_ds.zip",
            ),
            packaging_bucket_poa_xml: bucket(
                packaging,
                "outbox/elife_poa_e{id}.xml",
                "outbox/elife_poa_e{id}.xml",
            ),
            packaging_bucket_poa_pdf: bucket(
                packaging,
                "outbox/decap_elife_poa_e{id}.pdf",
                "outbox/decap_elife_poa_e{id}.pdf",
            ),
            bot_internal_digest_outbox_doc: bucket(
                configuration,
                "digests/outbox/{id}/digest-{id}.docx",
                "digests/outbox/{id}/digest-{id}.docx",
            ),
            bot_internal_digest_outbox_jpg: bucket(
                configuration,
                "digests/outbox/{id}/digest-{id}.jpg",
                "digests/outbox/{id}/digest-{id}.jpg",
            ),
            dashboard: DashboardArticleCheck::new(
                &settings.dashboard_host,
                &settings.dashboard_user,
                &settings.dashboard_password,
                http.clone(),
            ),
            lax: LaxArticleCheck::new(&settings.lax_host, http.clone()),
            api: ApiCheck::new(&settings.api_gateway_host, None, http.clone()),
            api_super_user: ApiCheck::new(
                &settings.api_gateway_host,
                settings.api_gateway_authorization.clone(),
                http.clone(),
            ),
            journal: JournalCheck::new(&settings.journal_host, policy, options)?,
            journal_googlebot: journal_cdn.with_headers(googlebot),
            journal_cdn,
            cdn_xml: HttpCheck::new(
                format!("{}/articles/{{id}}/elife-{{id}}-v{{version}}.xml", settings.generic_cdn_host),
                http.clone(),
            ),
            github_xml: GithubCheck::new(&settings.github_article_xml_repository_url, http.clone()),
            observer: ObserverCheck::new(&settings.observer_host, http.clone()),
            pubmed: HttpCheck::new(format!("{}/pubmed/{{xml}}", settings.bot_host), http.clone()),
            bot_emails: MailcatcherCheck::new(&settings.bot_mailcatcher, http),
        })
    }
}
