use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;

use crate::credentials::Credentials;
use crate::error::{CloudWatchError, Result};
use crate::region::Region;
use crate::sigv4::{amz_date, SignableRequest, SigV4Signer};
use crate::{Datapoint, MetricSource, StatisticsQuery};

const SERVICE: &str = "monitoring";
const CONTENT_TYPE: &str = "application/x-amz-json-1.0";
const GET_METRIC_STATISTICS_TARGET: &str = "GraniteServiceVersion20100801.GetMetricStatistics";

const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "TooManyRequestsException",
];

#[derive(Debug, Deserialize)]
struct GetMetricStatisticsOutput {
    #[serde(rename = "Datapoints", default)]
    datapoints: Vec<Datapoint>,
}

#[derive(Debug, Deserialize)]
struct ErrorDocument {
    #[serde(rename = "__type", default)]
    error_type: String,
    #[serde(alias = "Message", default)]
    message: String,
}

/// Signed CloudWatch client bound to one region.
pub struct CloudWatchClient {
    client: Client,
    host: String,
    signer: SigV4Signer,
}

impl CloudWatchClient {
    /// Build a client whose requests are cut off after `request_timeout`.
    pub fn new(region: &Region, credentials: Credentials, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .use_rustls_tls()
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            client,
            host: region.monitoring_host(),
            signer: SigV4Signer::new(credentials, region.code(), SERVICE),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Call a CloudWatch JSON-protocol action and return the raw response body.
    async fn call_api(&self, target: &str, payload: &str) -> Result<String> {
        let now = Utc::now();

        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), CONTENT_TYPE.to_string());
        headers.insert("host".to_string(), self.host.clone());
        headers.insert("x-amz-date".to_string(), amz_date(now));
        headers.insert("x-amz-target".to_string(), target.to_string());
        if let Some(token) = &self.signer.credentials().session_token {
            headers.insert("x-amz-security-token".to_string(), token.clone());
        }

        let authorization = self.signer.authorization(
            &SignableRequest {
                method: "POST",
                path: "/",
                query: "",
                headers: &headers,
                payload: payload.as_bytes(),
            },
            now,
        )?;

        let url = format!("https://{}/", self.host);
        let mut request = self.client.post(&url);
        for (name, value) in &headers {
            // reqwest derives Host from the URL
            if name != "host" {
                request = request.header(name.as_str(), value.as_str());
            }
        }

        let response = request
            .header("authorization", authorization)
            .body(payload.to_string())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), body));
        }

        Ok(body)
    }
}

#[async_trait::async_trait]
impl MetricSource for CloudWatchClient {
    async fn get_metric_statistics(&self, query: &StatisticsQuery) -> Result<Vec<Datapoint>> {
        let payload = serde_json::to_string(query)?;
        let body = self.call_api(GET_METRIC_STATISTICS_TARGET, &payload).await?;
        parse_statistics(&body)
    }
}

fn parse_statistics(body: &str) -> Result<Vec<Datapoint>> {
    let output: GetMetricStatisticsOutput = serde_json::from_str(body)?;
    Ok(output.datapoints)
}

/// Map a non-2xx response to the most specific error its body allows.
fn api_error(status: u16, body: String) -> CloudWatchError {
    let Ok(doc) = serde_json::from_str::<ErrorDocument>(&body) else {
        return CloudWatchError::HttpError { status, body };
    };
    if doc.error_type.is_empty() {
        return CloudWatchError::HttpError { status, body };
    }

    // "com.amazonaws.cloudwatch#InvalidParameterValueException" -> "InvalidParameterValueException"
    let code = doc
        .error_type
        .rsplit('#')
        .next()
        .unwrap_or(&doc.error_type)
        .to_string();

    if THROTTLING_CODES.contains(&code.as_str()) {
        CloudWatchError::RateLimited(doc.message)
    } else {
        CloudWatchError::ApiResponseError {
            code,
            message: doc.message,
        }
    }
}
