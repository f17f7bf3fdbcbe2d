//! Cisco Email Security connector against a mock appliance.

use chrono::{TimeZone, Utc};
use sa_connectors::cisco::commands::{
    list_entries_add_command, list_entries_delete_command, list_entries_get_command,
    messages_search_command, quarantine_action_command, quarantine_message_details_command,
    report_get_command, spam_quarantine_search_command,
};
use sa_connectors::cisco::params::{
    ListEntriesGetArgs, ListEntriesWriteArgs, MessagesSearchArgs, ReportArgs, SpamQuarantineArgs,
};
use sa_connectors::cisco::QuarantineAction;
use sa_connectors::testing::{assert_healthy, test_cisco_config};
use sa_connectors::{CiscoEsaConnector, Connector, ConnectorError};
use sa_core::{LastRun, Poller, Severity, Watermark};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "eyJhbGciOiJIUzI1NiJ9.test";

async fn mount_login(server: &MockServer, expected_logins: u64) {
    Mock::given(method("POST"))
        .and(path("/sma/api/v2.0/login"))
        .and(body_json(json!({
            "data": {"userName": "YWRtaW4=", "passphrase": "aXJvbnBvcnQ="}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"userName": "admin", "is2FARedirect": false, "jwtToken": TOKEN}
        })))
        .expect(expected_logins)
        .mount(server)
        .await;
}

fn connector(server: &MockServer) -> CiscoEsaConnector {
    CiscoEsaConnector::new(test_cisco_config(&server.uri())).unwrap()
}

fn quarantined(mid: u64, date: &str) -> serde_json::Value {
    json!({
        "mid": mid,
        "attributes": {
            "envelopeRecipient": ["user1@acme.com"],
            "date": date,
            "subject": format!("Quarantined {}", mid),
            "sender": "billing@bad.example",
            "size": "12.3K"
        }
    })
}

#[tokio::test]
async fn test_messages_search_logs_in_once() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/sma/api/v2.0/message-tracking/messages"))
        .and(header("jwtToken", TOKEN))
        .and(query_param("startDate", "2017-02-14T15:51:46.000Z"))
        .and(query_param("endDate", "2017-02-14T15:51:46.000Z"))
        .and(query_param("searchOption", "messages"))
        .and(query_param("offset", "0"))
        .and(query_param("limit", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"totalCount": 1},
            "data": [{
                "attributes": {
                    "mid": [4715],
                    "icid": 998,
                    "sender": "billing@bad.example",
                    "recipient": ["user1@acme.com"],
                    "subject": "Invoice overdue",
                    "timestamp": "14 Feb 2017 15:51:46 (GMT +00:00)"
                }
            }]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let connector = connector(&server);
    let args = MessagesSearchArgs {
        start_date: Some("2017-02-14T09:51:46.000-0600".into()),
        end_date: Some("2017-02-14T09:51:46.000-0600".into()),
        ..Default::default()
    };

    let result = messages_search_command(&connector, &args, Utc::now()).await.unwrap();
    assert_eq!(result.outputs_prefix.as_deref(), Some("CiscoEmailSecurity.Messages"));
    assert_eq!(result.outputs_key_field.as_deref(), Some("attributes.mid"));
    assert_eq!(result.outputs[0]["attributes"]["subject"], "Invoice overdue");
    assert!(result.readable_output.contains("Invoice overdue"));

    messages_search_command(&connector, &args, Utc::now()).await.unwrap();
}

#[tokio::test]
async fn test_rejected_session_triggers_new_login() {
    let server = MockServer::start().await;
    mount_login(&server, 2).await;

    Mock::given(method("GET"))
        .and(path("/sma/api/v2.0/quarantine/messages"))
        .and(query_param("mid", "4715"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sma/api/v2.0/quarantine/messages"))
        .and(query_param("mid", "4715"))
        .and(query_param("quarantineType", "spam"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": quarantined(4715, "19 May 2020 10:35 (GMT +00:00)")
        })))
        .mount(&server)
        .await;

    let connector = connector(&server);
    let err = quarantine_message_details_command(&connector, Some("4715"))
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectorError::AuthenticationFailed(_)));

    let result = quarantine_message_details_command(&connector, Some("4715"))
        .await
        .unwrap();
    assert_eq!(
        result.outputs_prefix.as_deref(),
        Some("CiscoEmailSecurity.QuarantineMessageDetails")
    );
    assert_eq!(result.outputs_key_field.as_deref(), Some("mid"));
    assert_eq!(result.outputs["mid"], 4715);
}

#[tokio::test]
async fn test_login_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/sma/api/v2.0/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let connector = connector(&server);
    let args = SpamQuarantineArgs {
        start_date: Some("1 day".into()),
        end_date: Some("now".into()),
        ..Default::default()
    };
    let err = spam_quarantine_search_command(&connector, &args, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectorError::AuthenticationFailed(_)));
}

#[tokio::test]
async fn test_spam_quarantine_search() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/sma/api/v2.0/quarantine/messages"))
        .and(query_param("startDate", "2019-11-20T09:36:09.000Z"))
        .and(query_param("quarantineType", "spam"))
        .and(query_param("limit", "20"))
        .and(query_param("orderBy", "date"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [quarantined(1, "20 Nov 2019 09:40 (GMT +00:00)")]
        })))
        .mount(&server)
        .await;

    let connector = connector(&server);
    let args = SpamQuarantineArgs {
        start_date: Some("2019-11-20 09:36:09".into()),
        end_date: Some("2019-11-21 09:36:09".into()),
        limit: Some("20".into()),
        order_by: Some("date".into()),
        ..Default::default()
    };
    let result = spam_quarantine_search_command(&connector, &args, Utc::now())
        .await
        .unwrap();

    assert_eq!(result.outputs_prefix.as_deref(), Some("CiscoEmailSecurity.SpamQuarantine"));
    assert_eq!(result.outputs_key_field.as_deref(), Some("mid"));
    assert!(result.readable_output.contains("| 1 | user1@acme.com | billing@bad.example |"));
}

#[tokio::test]
async fn test_quarantine_release_and_delete() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/sma/api/v2.0/quarantine/messages"))
        .and(body_json(json!({"action": "release", "mids": [1234], "quarantineType": "spam"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"action": "release", "totalCount": 1}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/sma/api/v2.0/quarantine/messages"))
        .and(body_json(json!({"action": "delete", "mids": [1234, 5678], "quarantineType": "spam"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"action": "delete", "totalCount": 2}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let connector = connector(&server);

    let released = quarantine_action_command(&connector, QuarantineAction::Release, Some("1234"))
        .await
        .unwrap();
    assert_eq!(
        released.outputs_prefix.as_deref(),
        Some("CiscoEmailSecurity.QuarantineReleaseMessages")
    );
    assert!(released.readable_output.contains("\"release\""));

    let deleted =
        quarantine_action_command(&connector, QuarantineAction::Delete, Some("1234,5678"))
            .await
            .unwrap();
    assert_eq!(
        deleted.outputs_prefix.as_deref(),
        Some("CiscoEmailSecurity.QuarantineDeleteMessages")
    );
    assert_eq!(deleted.outputs["totalCount"], 2);
}

#[tokio::test]
async fn test_list_entries_round() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/sma/api/v2.0/quarantine/safelist"))
        .and(query_param("action", "view"))
        .and(query_param("limit", "25"))
        .and(query_param("offset", "0"))
        .and(query_param("quarantineType", "spam"))
        .and(query_param("viewBy", "recipient"))
        .and(query_param("orderBy", "recipient"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"recipientAddress": "user1@acme.com", "senderList": ["acme.com"]}]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/sma/api/v2.0/quarantine/safelist"))
        .and(body_json(json!({
            "action": "add",
            "quarantineType": "spam",
            "viewBy": "recipient",
            "recipientAddresses": ["user1@acme.com", "user2@acme.com"],
            "senderList": ["acme.com"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"action": "add", "recipientAddresses": ["user1@acme.com", "user2@acme.com"]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/sma/api/v2.0/quarantine/safelist"))
        .and(body_json(json!({
            "action": "delete",
            "quarantineType": "spam",
            "viewBy": "recipient",
            "senderList": ["acme.com"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"action": "delete", "senderList": ["acme.com"]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let connector = connector(&server);

    let get_args = ListEntriesGetArgs {
        list_type: Some("safelist".into()),
        limit: Some("25".into()),
        order_by: Some("recipient".into()),
        view_by: Some("recipient".into()),
        ..Default::default()
    };
    let listed = list_entries_get_command(&connector, &get_args).await.unwrap();
    assert_eq!(listed.outputs_prefix.as_deref(), Some("CiscoEmailSecurity.ListEntriesGet"));
    assert!(listed.readable_output.contains("| user1@acme.com | acme.com |"));

    let add_args = ListEntriesWriteArgs {
        list_type: Some("safelist".into()),
        view_by: Some("recipient".into()),
        recipient_addresses: Some("user1@acme.com,user2@acme.com".into()),
        sender_list: Some("acme.com".into()),
        ..Default::default()
    };
    let added = list_entries_add_command(&connector, &add_args).await.unwrap();
    assert_eq!(added.outputs_prefix.as_deref(), Some("CiscoEmailSecurity.listEntriesAdd"));
    assert_eq!(added.outputs["action"], "add");

    let delete_args = ListEntriesWriteArgs {
        list_type: Some("safelist".into()),
        sender_list: Some("acme.com".into()),
        ..Default::default()
    };
    let deleted = list_entries_delete_command(&connector, &delete_args)
        .await
        .unwrap();
    assert_eq!(
        deleted.outputs_prefix.as_deref(),
        Some("CiscoEmailSecurity.listEntriesDelete")
    );
}

#[tokio::test]
async fn test_invalid_list_type_sends_nothing() {
    let server = MockServer::start().await;
    let connector = connector(&server);

    let args = ListEntriesGetArgs {
        list_type: Some("allowlist".into()),
        ..Default::default()
    };
    let err = list_entries_get_command(&connector, &args).await.unwrap_err();
    assert!(matches!(err, ConnectorError::InvalidArgument(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_report_get() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/sma/api/v2.0/reporting/mail_incoming_traffic_summary"))
        .and(query_param("device_type", "esa"))
        .and(query_param("startDate", "2020-05-18T00:00:00.000Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "type": "mail_incoming_traffic_summary",
                "resultSet": [{"total_clean_recipients": 1024}, {"total_spam_recipients": 12}]
            }
        })))
        .mount(&server)
        .await;

    let connector = connector(&server);
    let args = ReportArgs {
        report_type: Some("mail_incoming_traffic_summary".into()),
        start_date: Some("2020-05-18".into()),
        end_date: Some("2020-05-19".into()),
        ..Default::default()
    };
    let result = report_get_command(&connector, &args, Utc::now()).await.unwrap();

    assert_eq!(result.outputs_prefix.as_deref(), Some("CiscoEmailSecurity.Report"));
    assert_eq!(result.outputs_key_field.as_deref(), Some("type"));
    assert!(result.readable_output.contains("| total_spam_recipients | 12 |"));
}

#[tokio::test]
async fn test_poll_cycle_over_quarantine() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/sma/api/v2.0/quarantine/messages"))
        .and(query_param("startDate", "2020-05-19T10:00:00.000Z"))
        .and(query_param("quarantineType", "spam"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                quarantined(1, "19 May 2020 09:00 (GMT +00:00)"),
                quarantined(2, "19 May 2020 10:35 (GMT +00:00)"),
                {"mid": 3, "attributes": {"subject": "no date"}}
            ]
        })))
        .mount(&server)
        .await;

    let connector = connector(&server);
    let now = Utc.with_ymd_and_hms(2020, 5, 19, 12, 0, 0).unwrap();
    let cycle = Poller::default()
        .poll(
            &connector,
            LastRun::at(Watermark::from_epoch_secs(1_589_882_400)),
            now,
        )
        .await
        .unwrap();

    assert_eq!(cycle.incidents.len(), 1);
    assert_eq!(cycle.incidents[0].name, "Quarantined 2");
    assert_eq!(cycle.incidents[0].severity, Severity::Medium);
    assert_eq!(cycle.rejected.len(), 1);
    assert_eq!(cycle.rejected[0].record_id(), "3");
    assert_eq!(
        cycle.next_watermark(),
        Some(Watermark::from_epoch_secs(1_589_884_500))
    );
}

#[tokio::test]
async fn test_health_check() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/sma/api/v2.0/quarantine/messages"))
        .and(header("jwtToken", TOKEN))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let connector = connector(&server);
    assert_healthy(&connector.health_check().await);
}
