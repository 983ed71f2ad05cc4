// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    AnnotationID, Credentials, Error, GroupID, MapAnnotation, ObjectID, ObjectType,
    RemoteObject, Repository, Session, api::LoginResult,
};
use log::{Level, debug, error, log_enabled, trace};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{collections::HashMap, time::Duration};
use url::Url;

#[derive(Serialize)]
struct RpcRequest<Params> {
    id: u64,
    jsonrpc: String,
    method: String,
    params: Option<Params>,
}

impl<T> Default for RpcRequest<T> {
    fn default() -> Self {
        RpcRequest {
            id: 0,
            jsonrpc: "2.0".to_string(),
            method: "".to_string(),
            params: None,
        }
    }
}

#[derive(Deserialize)]
struct RpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize)]
struct RpcResponse<RpcResult> {
    #[allow(dead_code)]
    id: serde_json::Value,
    #[allow(dead_code)]
    jsonrpc: String,
    error: Option<RpcError>,
    result: Option<RpcResult>,
}

#[derive(Serialize)]
struct SudoParams<'a> {
    username: &'a str,
    group: &'a str,
    ttl_ms: u64,
}

#[derive(Serialize)]
struct ObjectListParams<'a> {
    #[serde(rename = "type")]
    object_type: ObjectType,
    name: &'a str,
}

#[derive(Serialize)]
struct ObjectParams {
    #[serde(rename = "type")]
    object_type: ObjectType,
    id: ObjectID,
}

#[derive(Serialize)]
struct AnnotationListParams<'a> {
    #[serde(rename = "type")]
    object_type: ObjectType,
    id: ObjectID,
    ns: &'a str,
}

#[derive(Serialize)]
struct AnnotationPostParams<'a> {
    #[serde(rename = "type")]
    object_type: ObjectType,
    id: ObjectID,
    ns: &'a str,
    values: &'a [(String, String)],
}

#[derive(Deserialize)]
struct GroupResult {
    id: GroupID,
}

#[derive(Deserialize)]
struct AnnotationPostResult {
    id: AnnotationID,
}

/// Response to a call whose result carries no data.
#[derive(Deserialize)]
struct RpcAck {
    error: Option<RpcError>,
}

/// Builds the gateway endpoint from a server and port.
///
/// A bare hostname is served over `https`; a full `http://` or `https://`
/// URL keeps its scheme and path prefix.  The port always comes from
/// `port`.
fn endpoint(server: &str, port: u16) -> Result<Url, Error> {
    let server = server.trim();
    if server.is_empty() {
        return Err(Error::InvalidParameters("server must not be empty".to_string()));
    }

    let mut url = if server.contains("://") {
        Url::parse(server)?
    } else {
        Url::parse(&format!("https://{}", server))?
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(Error::InvalidParameters(format!(
            "unsupported scheme {}",
            url.scheme()
        )));
    }

    url.set_port(Some(port))
        .map_err(|_| Error::InvalidParameters(format!("cannot set port on {}", server)))?;

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url.join("api")?)
}

/// Session methods carry credentials or keys and are never traced verbatim.
fn sensitive(method: &str) -> bool {
    method.starts_with("session.")
}

fn decode_rpc_response<RpcResult>(body: &[u8]) -> Result<RpcResult, Error>
where
    RpcResult: DeserializeOwned,
{
    let response: RpcResponse<RpcResult> = match serde_json::from_slice(body) {
        Ok(response) => response,
        Err(err) => {
            error!("Invalid JSON Response: {}", String::from_utf8_lossy(body));
            return Err(err.into());
        }
    };

    if let Some(error) = response.error {
        Err(Error::RpcError(error.code, error.message))
    } else if let Some(result) = response.result {
        Ok(result)
    } else {
        Err(Error::InvalidResponse)
    }
}

/// Any `result`, `null` included, acknowledges the call.
fn decode_rpc_ack(body: &[u8]) -> Result<(), Error> {
    let ack: RpcAck = match serde_json::from_slice(body) {
        Ok(ack) => ack,
        Err(err) => {
            error!("Invalid JSON Response: {}", String::from_utf8_lossy(body));
            return Err(err.into());
        }
    };

    match ack.error {
        Some(error) => Err(Error::RpcError(error.code, error.message)),
        None => Ok(()),
    }
}

/// JSON-RPC client for the image repository gateway.
///
/// Requests are JSON-RPC 2.0 calls posted to `{server}:{port}/api`; the
/// session key travels as a bearer token.  Each call is sent once, there is
/// no retry layer, so a failed write surfaces to the caller immediately.
///
/// # Examples
///
/// ```no_run
/// use komp_keys::{Client, Credentials, ObjectType, Repository};
///
/// # async fn example() -> Result<(), komp_keys::Error> {
/// let client = Client::new("bhomero01lp.jax.org", 4064)?;
/// let session = client.connect(&Credentials::new("mpk", "password")).await?;
/// let datasets = client
///     .list_objects(&session, ObjectType::Dataset, "EyeBatch1")
///     .await?;
/// println!("Found {} datasets", datasets.len());
/// client.close(session).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    url: Url,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.url.as_str())
            .finish()
    }
}

impl Client {
    /// Create a client for the gateway at `server:port` with the default
    /// 30 second request timeout.
    pub fn new(server: &str, port: u16) -> Result<Self, Error> {
        Self::with_timeout(server, port, Duration::from_secs(30))
    }

    /// Create a client with an explicit request timeout.
    pub fn with_timeout(server: &str, port: u16, timeout: Duration) -> Result<Self, Error> {
        let url = endpoint(server, port)?;
        debug!("Repository gateway {} (timeout {:?})", url, timeout);

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;

        Ok(Client { http, url })
    }

    /// Returns the gateway endpoint URL.
    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Send a JSON-RPC request to the gateway.  When a session is given its
    /// key is sent in the `Authorization` header.
    ///
    /// NOTE: This API would generally not be called directly and instead users
    /// should use the [`Repository`] methods.
    pub async fn rpc<Params, RpcResult>(
        &self,
        session: Option<&Session>,
        method: &str,
        params: Option<Params>,
    ) -> Result<RpcResult, Error>
    where
        Params: Serialize,
        RpcResult: DeserializeOwned,
    {
        let body = self.send(session, method, params).await?;
        decode_rpc_response(&body)
    }

    /// Send a JSON-RPC request whose result is ignored.
    async fn rpc_ack<Params: Serialize>(
        &self,
        session: Option<&Session>,
        method: &str,
        params: Option<Params>,
    ) -> Result<(), Error> {
        let body = self.send(session, method, params).await?;
        decode_rpc_ack(&body)
    }

    async fn send<Params: Serialize>(
        &self,
        session: Option<&Session>,
        method: &str,
        params: Option<Params>,
    ) -> Result<Vec<u8>, Error> {
        let request = RpcRequest {
            method: method.to_string(),
            params,
            ..Default::default()
        };

        if log_enabled!(Level::Trace) {
            if sensitive(method) {
                trace!("RPC Request: {} <params redacted>", method);
            } else {
                trace!(
                    "RPC Request: {}",
                    serde_json::ser::to_string_pretty(&request)?
                );
            }
        }

        let mut req = self
            .http
            .post(self.url.clone())
            .header("Accept", "application/json")
            .header("User-Agent", concat!("komp-keys/", env!("CARGO_PKG_VERSION")));
        if let Some(session) = session {
            req = req.header("Authorization", format!("Bearer {}", session.key()));
        }

        let res = req.json(&request).send().await?;

        if res.status() == StatusCode::UNAUTHORIZED || res.status() == StatusCode::FORBIDDEN {
            return Err(Error::Unauthorized);
        }
        let res = res.error_for_status()?;
        let body = res.bytes().await?.to_vec();

        if log_enabled!(Level::Trace) && !sensitive(method) {
            trace!("RPC Response: {}", String::from_utf8_lossy(&body));
        }

        Ok(body)
    }
}

impl Repository for Client {
    async fn connect(&self, credentials: &Credentials) -> Result<Session, Error> {
        let params = HashMap::from([
            ("username", credentials.username()),
            ("password", credentials.password()),
        ]);
        let login: LoginResult = match self.rpc(None, "session.login", Some(params)).await {
            Ok(login) => login,
            Err(Error::RpcError(code, message)) => {
                error!("Login rejected ({}): {}", code, message);
                return Err(Error::AuthenticationFailed(credentials.username().to_string()));
            }
            Err(e) => return Err(e),
        };

        if login.session.is_empty() {
            return Err(Error::EmptySession);
        }

        debug!("Connected to {} as {}", self.url, credentials.username());
        Ok(Session::new(login.session, credentials.username()))
    }

    async fn elevate(
        &self,
        session: &Session,
        target_user: &str,
        target_group: &str,
        ttl: Duration,
    ) -> Result<Session, Error> {
        let params = SudoParams {
            username: target_user,
            group: target_group,
            ttl_ms: ttl.as_millis().try_into().unwrap_or(u64::MAX),
        };
        let login: LoginResult = match self.rpc(Some(session), "session.sudo", Some(params)).await {
            Ok(login) => login,
            Err(Error::RpcError(code, message)) => {
                error!(
                    "{} may not act as {} in {} ({}): {}",
                    session.user(),
                    target_user,
                    target_group,
                    code,
                    message
                );
                return Err(Error::Unauthorized);
            }
            Err(e) => return Err(e),
        };

        if login.session.is_empty() {
            return Err(Error::EmptySession);
        }

        debug!(
            "{} acting as {} in group {}",
            session.user(),
            target_user,
            target_group
        );
        Ok(Session::new(login.session, target_user))
    }

    async fn resolve_group_id(
        &self,
        session: &Session,
        group_name: &str,
    ) -> Result<GroupID, Error> {
        let params = HashMap::from([("name", group_name)]);
        let groups: Vec<GroupResult> = self
            .rpc(Some(session), "group.lookup", Some(params))
            .await?;
        groups
            .into_iter()
            .next()
            .map(|g| g.id)
            .ok_or_else(|| Error::GroupNotFound(group_name.to_string()))
    }

    async fn set_active_group(&self, session: &Session, group_id: GroupID) -> Result<(), Error> {
        let params = HashMap::from([("group_id", group_id)]);
        self.rpc_ack(Some(session), "session.set_group", Some(params))
            .await?;
        debug!("Active group set to {}", group_id);
        Ok(())
    }

    async fn list_objects(
        &self,
        session: &Session,
        object_type: ObjectType,
        name: &str,
    ) -> Result<Vec<RemoteObject>, Error> {
        let params = ObjectListParams { object_type, name };
        let objects: Vec<RemoteObject> = self
            .rpc(Some(session), "object.list", Some(params))
            .await?;
        debug!("{} {} named {:?}", objects.len(), object_type, name);
        Ok(objects)
    }

    async fn list_children(
        &self,
        session: &Session,
        object_type: ObjectType,
        id: ObjectID,
    ) -> Result<Vec<RemoteObject>, Error> {
        let params = ObjectParams { object_type, id };
        self.rpc(Some(session), "object.children", Some(params))
            .await
    }

    async fn list_annotations(
        &self,
        session: &Session,
        object_type: ObjectType,
        id: ObjectID,
        namespace: &str,
    ) -> Result<Vec<AnnotationID>, Error> {
        let params = AnnotationListParams {
            object_type,
            id,
            ns: namespace,
        };
        self.rpc(Some(session), "annotation.list", Some(params))
            .await
    }

    async fn get_annotation(
        &self,
        session: &Session,
        id: AnnotationID,
    ) -> Result<MapAnnotation, Error> {
        let params = HashMap::from([("annotation_id", id)]);
        self.rpc(Some(session), "annotation.get", Some(params))
            .await
    }

    async fn post_annotation(
        &self,
        session: &Session,
        object_type: ObjectType,
        id: ObjectID,
        annotation: &MapAnnotation,
    ) -> Result<AnnotationID, Error> {
        let params = AnnotationPostParams {
            object_type,
            id,
            ns: annotation.namespace(),
            values: annotation.values(),
        };
        let result: AnnotationPostResult = self
            .rpc(Some(session), "annotation.post", Some(params))
            .await?;
        Ok(result.id)
    }

    async fn close(&self, session: Session) -> Result<(), Error> {
        self.rpc_ack::<()>(Some(&session), "session.logout", None)
            .await?;
        debug!("Closed session for {}", session.user());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_bare_hostname() {
        let url = endpoint("bhomero01lp.jax.org", 4064).unwrap();
        assert_eq!(url.as_str(), "https://bhomero01lp.jax.org:4064/api");
    }

    #[test]
    fn test_endpoint_explicit_scheme() {
        let url = endpoint("http://localhost", 8080).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api");

        let url = endpoint("https://gateway.example.org/omero", 4064).unwrap();
        assert_eq!(url.as_str(), "https://gateway.example.org:4064/omero/api");

        // Default ports are elided by the URL serializer
        let url = endpoint("https://gateway.example.org", 443).unwrap();
        assert_eq!(url.as_str(), "https://gateway.example.org/api");
    }

    #[test]
    fn test_endpoint_rejects_invalid() {
        assert!(matches!(endpoint("", 4064), Err(Error::InvalidParameters(_))));
        assert!(matches!(
            endpoint("ftp://files.example.org", 21),
            Err(Error::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_client_url() {
        let client = Client::new("localhost", 4064).unwrap();
        assert_eq!(client.url(), "https://localhost:4064/api");
        assert!(format!("{:?}", client).contains("localhost:4064"));
    }

    #[test]
    fn test_request_serialization() {
        let request = RpcRequest {
            method: "annotation.post".to_string(),
            params: Some(AnnotationPostParams {
                object_type: ObjectType::Image,
                id: ObjectID::from(12),
                ns: "ns",
                values: &[("fundus".to_string(), String::new())],
            }),
            ..Default::default()
        };
        let json: serde_json::Value = serde_json::to_value(&request).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["method"], "annotation.post");
        assert_eq!(json["params"]["type"], "Image");
        assert_eq!(json["params"]["id"], 12);
        assert_eq!(json["params"]["values"][0][0], "fundus");
        assert_eq!(json["params"]["values"][0][1], "");
    }

    #[test]
    fn test_decode_result() {
        let body = br#"{"id": 0, "jsonrpc": "2.0", "result": [{"id": 3, "name": "A.tif"}]}"#;
        let objects: Vec<RemoteObject> = decode_rpc_response(body).unwrap();
        assert_eq!(objects, vec![RemoteObject::new(ObjectID::from(3), "A.tif")]);
    }

    #[test]
    fn test_decode_error() {
        let body = br#"{
            "id": "999",
            "jsonrpc": "2.0",
            "error": {"code": -32000, "message": "no such group"}
        }"#;
        let result: Result<GroupResult, Error> = decode_rpc_response(body);
        assert!(matches!(result, Err(Error::RpcError(-32000, msg)) if msg == "no such group"));
    }

    #[test]
    fn test_decode_missing_result() {
        let body = br#"{"id": 0, "jsonrpc": "2.0"}"#;
        let result: Result<Vec<AnnotationID>, Error> = decode_rpc_response(body);
        assert!(matches!(result, Err(Error::InvalidResponse)));

        let result: Result<Vec<AnnotationID>, Error> = decode_rpc_response(b"<html>");
        assert!(matches!(result, Err(Error::JsonError(_))));
    }

    #[test]
    fn test_decode_ack() {
        decode_rpc_ack(br#"{"id": 0, "jsonrpc": "2.0", "result": null}"#).unwrap();
        decode_rpc_ack(br#"{"id": 0, "jsonrpc": "2.0", "result": {}}"#).unwrap();
        decode_rpc_ack(br#"{"id": 0, "jsonrpc": "2.0"}"#).unwrap();

        let body = br#"{"id": 0, "jsonrpc": "2.0", "error": {"code": 2, "message": "gone"}}"#;
        assert!(matches!(decode_rpc_ack(body), Err(Error::RpcError(2, _))));
    }

    #[test]
    fn test_sensitive_methods() {
        assert!(sensitive("session.login"));
        assert!(sensitive("session.sudo"));
        assert!(!sensitive("annotation.post"));
    }

    mod gateway {
        use super::*;
        use serde_json::{Value, json};
        use wiremock::{
            Mock, MockBuilder, MockServer, ResponseTemplate,
            matchers::{body_partial_json, header, method, path},
        };

        fn rpc_result(result: Value) -> ResponseTemplate {
            ResponseTemplate::new(200).set_body_json(json!({
                "id": 0,
                "jsonrpc": "2.0",
                "result": result,
            }))
        }

        fn rpc_error(code: i32, message: &str) -> ResponseTemplate {
            ResponseTemplate::new(200).set_body_json(json!({
                "id": 0,
                "jsonrpc": "2.0",
                "error": {"code": code, "message": message},
            }))
        }

        fn call(rpc_method: &str) -> MockBuilder {
            Mock::given(method("POST"))
                .and(path("/api"))
                .and(body_partial_json(json!({"method": rpc_method})))
        }

        fn client(server: &MockServer) -> Client {
            Client::new("http://127.0.0.1", server.address().port()).unwrap()
        }

        fn session() -> Session {
            Session::new("key-1", "mpk")
        }

        #[tokio::test]
        async fn test_login_and_logout() {
            let server = MockServer::start().await;
            call("session.login")
                .and(body_partial_json(json!({
                    "params": {"username": "mpk", "password": "pw"}
                })))
                .respond_with(rpc_result(json!({"session": "key-1"})))
                .expect(1)
                .mount(&server)
                .await;
            call("session.logout")
                .and(header("Authorization", "Bearer key-1"))
                .respond_with(rpc_result(Value::Null))
                .expect(1)
                .mount(&server)
                .await;

            let client = client(&server);
            let session = client.connect(&Credentials::new("mpk", "pw")).await.unwrap();
            assert_eq!(session.key(), "key-1");
            assert_eq!(session.user(), "mpk");
            client.close(session).await.unwrap();
        }

        #[tokio::test]
        async fn test_login_rejected() {
            let server = MockServer::start().await;
            call("session.login")
                .respond_with(rpc_error(-32001, "bad credentials"))
                .mount(&server)
                .await;

            let err = client(&server)
                .connect(&Credentials::new("mpk", "wrong"))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::AuthenticationFailed(user) if user == "mpk"));
        }

        #[tokio::test]
        async fn test_login_empty_session_key() {
            let server = MockServer::start().await;
            call("session.login")
                .respond_with(rpc_result(json!({"session": ""})))
                .mount(&server)
                .await;

            let err = client(&server)
                .connect(&Credentials::new("mpk", "pw"))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::EmptySession));
        }

        #[tokio::test]
        async fn test_http_status_unauthorized() {
            let server = MockServer::start().await;
            call("object.list")
                .respond_with(ResponseTemplate::new(401))
                .mount(&server)
                .await;
            call("object.children")
                .respond_with(ResponseTemplate::new(403))
                .mount(&server)
                .await;

            let client = client(&server);
            let err = client
                .list_objects(&session(), ObjectType::Dataset, "EyeBatch1")
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Unauthorized));

            let err = client
                .list_children(&session(), ObjectType::Dataset, ObjectID::from(1))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Unauthorized));
        }

        #[tokio::test]
        async fn test_http_server_error() {
            let server = MockServer::start().await;
            call("annotation.get")
                .respond_with(ResponseTemplate::new(500))
                .mount(&server)
                .await;

            let err = client(&server)
                .get_annotation(&session(), AnnotationID::from(4))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::HttpError(_)));
        }

        #[tokio::test]
        async fn test_sudo_granted_and_denied() {
            let server = MockServer::start().await;
            call("session.sudo")
                .and(body_partial_json(json!({
                    "params": {"username": "mpk", "group": "KOMP_eye", "ttl_ms": 600000}
                })))
                .respond_with(rpc_result(json!({"session": "key-2"})))
                .mount(&server)
                .await;
            call("session.sudo")
                .and(body_partial_json(json!({"params": {"username": "jdoe"}})))
                .respond_with(rpc_error(-32003, "not an administrator"))
                .mount(&server)
                .await;

            let client = client(&server);
            let admin = Session::new("key-1", "root");
            let elevated = client
                .elevate(&admin, "mpk", "KOMP_eye", Duration::from_millis(600_000))
                .await
                .unwrap();
            assert_eq!(elevated.key(), "key-2");
            assert_eq!(elevated.user(), "mpk");

            let err = client
                .elevate(&admin, "jdoe", "KOMP_eye", Duration::from_millis(600_000))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Unauthorized));
        }

        #[tokio::test]
        async fn test_group_lookup_and_selection() {
            let server = MockServer::start().await;
            call("group.lookup")
                .and(body_partial_json(json!({"params": {"name": "KOMP_eye"}})))
                .respond_with(rpc_result(json!([{"id": 53}])))
                .mount(&server)
                .await;
            call("group.lookup")
                .and(body_partial_json(json!({"params": {"name": "Nope"}})))
                .respond_with(rpc_result(json!([])))
                .mount(&server)
                .await;
            call("session.set_group")
                .and(body_partial_json(json!({"params": {"group_id": 53}})))
                .respond_with(rpc_result(Value::Null))
                .expect(1)
                .mount(&server)
                .await;

            let client = client(&server);
            let group = client.resolve_group_id(&session(), "KOMP_eye").await.unwrap();
            assert_eq!(group, GroupID::from(53));
            client.set_active_group(&session(), group).await.unwrap();

            let err = client
                .resolve_group_id(&session(), "Nope")
                .await
                .unwrap_err();
            assert!(matches!(err, Error::GroupNotFound(name) if name == "Nope"));
        }

        #[tokio::test]
        async fn test_list_then_post_annotation() {
            let server = MockServer::start().await;
            call("object.list")
                .and(header("Authorization", "Bearer key-1"))
                .and(body_partial_json(json!({
                    "params": {"type": "Dataset", "name": "EyeBatch1"}
                })))
                .respond_with(rpc_result(json!([{"id": 7, "name": "EyeBatch1"}])))
                .mount(&server)
                .await;
            call("object.children")
                .and(body_partial_json(json!({"params": {"type": "Dataset", "id": 7}})))
                .respond_with(rpc_result(json!([{"id": 12, "name": "A.tif"}])))
                .mount(&server)
                .await;
            call("annotation.list")
                .and(body_partial_json(json!({
                    "params": {"type": "Image", "id": 12, "ns": "example.org/ns"}
                })))
                .respond_with(rpc_result(json!([])))
                .mount(&server)
                .await;
            call("annotation.post")
                .and(body_partial_json(json!({
                    "params": {
                        "type": "Image",
                        "id": 12,
                        "ns": "example.org/ns",
                        "values": [["fundus", ""], ["annotation_status", ""]]
                    }
                })))
                .respond_with(rpc_result(json!({"id": 99})))
                .expect(1)
                .mount(&server)
                .await;

            let client = client(&server);
            let session = session();
            let datasets = client
                .list_objects(&session, ObjectType::Dataset, "EyeBatch1")
                .await
                .unwrap();
            assert_eq!(datasets, vec![RemoteObject::new(ObjectID::from(7), "EyeBatch1")]);

            let images = client
                .list_children(&session, ObjectType::Dataset, datasets[0].id())
                .await
                .unwrap();
            assert_eq!(images[0].name(), "A.tif");

            let existing = client
                .list_annotations(&session, ObjectType::Image, images[0].id(), "example.org/ns")
                .await
                .unwrap();
            assert!(existing.is_empty());

            let annotation = MapAnnotation::new(
                "example.org/ns",
                vec![
                    ("fundus".to_string(), String::new()),
                    ("annotation_status".to_string(), String::new()),
                ],
            );
            let id = client
                .post_annotation(&session, ObjectType::Image, images[0].id(), &annotation)
                .await
                .unwrap();
            assert_eq!(id, AnnotationID::from(99));
        }

        #[tokio::test]
        async fn test_get_annotation_decodes_values() {
            let server = MockServer::start().await;
            call("annotation.get")
                .and(body_partial_json(json!({"params": {"annotation_id": 4}})))
                .respond_with(rpc_result(json!({
                    "ns": "openmicroscopy.org/omero/client/mapAnnotation",
                    "values": [["annotation_status", "done"]]
                })))
                .mount(&server)
                .await;

            let annotation = client(&server)
                .get_annotation(&session(), AnnotationID::from(4))
                .await
                .unwrap();
            assert_eq!(annotation.get("annotation_status"), Some("done"));
        }
    }
}
