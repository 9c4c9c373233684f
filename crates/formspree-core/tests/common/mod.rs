#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use formspree::{
    ClientError, FormRequest, PaymentIntent, PaymentProvider, ProviderError, ResponseMeta,
    Transport, TransportResponse,
};
use serde_json::Value;

/// Transport that records requests and replays canned JSON responses.
pub struct MockTransport {
    responses: Mutex<VecDeque<(u16, Value)>>,
    repeat_last: bool,
    requests: Mutex<Vec<(String, FormRequest)>>,
}

impl MockTransport {
    pub fn new(responses: Vec<(u16, Value)>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            repeat_last: false,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Answers every request with the same body.
    pub fn always(status: u16, body: Value) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(VecDeque::from([(status, body)])),
            repeat_last: true,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<(String, FormRequest)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// JSON bodies of all requests sent so far.
    pub fn json_bodies(&self) -> Vec<Value> {
        self.requests()
            .iter()
            .map(|(_, req)| serde_json::from_str(req.json_body().expect("json body")).unwrap())
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, url: &str, request: FormRequest) -> Result<TransportResponse, ClientError> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), request));

        let mut responses = self.responses.lock().unwrap();
        let (status, body) = if self.repeat_last {
            responses.front().cloned()
        } else {
            responses.pop_front()
        }
        .ok_or_else(|| ClientError::Http("connection refused".to_string()))?;

        Ok(TransportResponse {
            meta: ResponseMeta::new(status),
            body: serde_json::to_vec(&body).unwrap(),
        })
    }
}

/// Payment provider whose SCA challenge always gives the same answer.
pub struct MockStripe {
    result: Result<PaymentIntent, ProviderError>,
    secrets: Mutex<Vec<String>>,
}

impl MockStripe {
    pub fn succeeding(intent_id: &str) -> Self {
        Self {
            result: Ok(PaymentIntent {
                id: intent_id.to_string(),
            }),
            secrets: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(ProviderError::new(message)),
            secrets: Mutex::new(Vec::new()),
        }
    }

    pub fn secrets(&self) -> Vec<String> {
        self.secrets.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentProvider for MockStripe {
    async fn handle_card_action(
        &self,
        client_secret: &str,
    ) -> Result<PaymentIntent, ProviderError> {
        self.secrets.lock().unwrap().push(client_secret.to_string());
        self.result.clone()
    }
}

/// Counts how often the payment-method callback ran.
#[derive(Default)]
pub struct CallCounter(AtomicUsize);

impl CallCounter {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
