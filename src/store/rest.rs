use serde_json::Value;

use crate::util::http::{HttpRequest, HttpRequester};

use super::{Error, Filters, RecordStore, Table, IMPORT_KEY};

/// Talks to the hosted backend's auto-generated REST interface (one
/// endpoint per table, PostgREST conventions).
pub struct RestRecordStore {
    base_url: String,
    api_key: String,
    http: Box<dyn HttpRequester>,
}

impl RestRecordStore {
    pub fn new(base_url: &str, api_key: &str, http: Box<dyn HttpRequester>) -> RestRecordStore {
        RestRecordStore {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http,
        }
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/{}", self.base_url, table.name())
    }

    fn authorize(&self, req: HttpRequest) -> HttpRequest {
        req.with_header("apikey", &self.api_key)
            .with_header("Authorization", &format!("Bearer {}", self.api_key))
    }

    async fn exchange(&self, table: Table, req: HttpRequest) -> Result<Vec<Value>, Error> {
        let res = self.http.send(self.authorize(req)).await?;
        if !res.is_success() {
            return Err(format!("{} ({}): {}", table.name(), res.status, res.body.trim()));
        }
        if res.body.trim().is_empty() {
            return Ok(Vec::new());
        }
        let parsed: Value = serde_json::from_str(&res.body)
            .map_err(|e| format!("{}: unreadable response: {e}", table.name()))?;
        match parsed {
            Value::Array(rows) => Ok(rows),
            obj @ Value::Object(_) => Ok(vec![obj]),
            other => Err(format!("{}: unexpected response {other}", table.name())),
        }
    }
}

#[async_trait::async_trait(?Send)]
impl RecordStore for RestRecordStore {
    async fn insert_rows(&self, table: Table, rows: &[Value]) -> Result<Vec<Value>, Error> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::to_string(rows).map_err(|e| format!("{e}"))?;
        let req = HttpRequest::post_json(
            format!("{}?on_conflict={}", self.table_url(table), IMPORT_KEY),
            body,
        )
        .with_header("Prefer", "return=representation,resolution=merge-duplicates");
        tracing::debug!("Inserting {} rows into {}", rows.len(), table.name());
        self.exchange(table, req).await
    }

    async fn select_rows(&self, table: Table, filters: &Filters) -> Result<Vec<Value>, Error> {
        let mut url = format!("{}?select=*", self.table_url(table));
        for (col, val) in filters {
            url.push_str(&format!(
                "&{}=eq.{}",
                urlencoding::encode(col),
                urlencoding::encode(val)
            ));
        }
        self.exchange(table, HttpRequest::get(url)).await
    }
}

#[cfg(test)]
mod tests {
    use async_std::task::block_on;
    use serde_json::json;

    use crate::{
        store::{find_issuer_by_name, RecordStore, Table},
        util::http::{testlib::ScriptedHttpRequester, HttpMethod},
    };

    use super::RestRecordStore;

    #[test]
    fn test_insert_rows_request() {
        let http = Box::new(ScriptedHttpRequester::new(vec![ScriptedHttpRequester::ok(
            201,
            r#"[{"id": 5, "account_number": "ACC-1"}]"#,
        )]));
        let requests = http.requests.clone();
        let store = RestRecordStore::new("https://db.example.com/rest/v1/", "k3y", http);

        let rows = block_on(
            store.insert_rows(Table::Shareholders, &[json!({"account_number": "ACC-1"})]),
        )
        .unwrap();
        assert_eq!(rows, vec![json!({"id": 5, "account_number": "ACC-1"})]);

        let requests = requests.borrow();
        assert_eq!(requests.len(), 1);
        let req = &requests[0];
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(
            req.url,
            "https://db.example.com/rest/v1/shareholders?on_conflict=import_key"
        );
        assert!(req.headers.contains(&("apikey".to_string(), "k3y".to_string())));
        assert!(req
            .headers
            .contains(&("Authorization".to_string(), "Bearer k3y".to_string())));
        assert_eq!(req.body.as_deref(), Some(r#"[{"account_number":"ACC-1"}]"#));
    }

    #[test]
    fn test_error_status() {
        let http = Box::new(ScriptedHttpRequester::new(vec![ScriptedHttpRequester::ok(
            409,
            r#"{"message": "duplicate key"}"#,
        )]));
        let store = RestRecordStore::new("http://x", "k", http);
        let err = block_on(store.insert_rows(Table::Securities, &[json!({})])).unwrap_err();
        assert_eq!(err, r#"securities (409): {"message": "duplicate key"}"#);
    }

    #[test]
    fn test_find_issuer_by_name() {
        let http = Box::new(ScriptedHttpRequester::new(vec![
            ScriptedHttpRequester::ok(200, r#"[{"id": "u-1", "name": "Acme & Co", "address": null}]"#),
            ScriptedHttpRequester::ok(200, "[]"),
        ]));
        let store = RestRecordStore::new("http://x", "k", http);

        let found = block_on(find_issuer_by_name(&store, "Acme & Co")).unwrap().unwrap();
        assert_eq!(found.id.to_string(), "u-1");
        assert_eq!(found.issuer.name, "Acme & Co");
        assert_eq!(found.issuer.address, "");

        assert_eq!(block_on(find_issuer_by_name(&store, "Nobody")).unwrap(), None);
    }
}
