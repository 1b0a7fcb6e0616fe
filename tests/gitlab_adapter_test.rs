use std::sync::Arc;
use std::time::Duration;

use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;

use forge_bridge::gitlab::GitLabProvider;
use forge_bridge::model::*;
use forge_bridge::{
    ErrorCode, IssueProvider, PipelineProvider, PullRequestProvider, RepositoryProvider, StaticTokenAuth,
    UserProvider,
};

fn provider(server: &ServerGuard) -> GitLabProvider {
    GitLabProvider::new(
        &server.url(),
        Arc::new(StaticTokenAuth::named("PRIVATE-TOKEN", "glpat-test")),
        Duration::from_secs(5),
    )
    .unwrap()
}

fn author() -> serde_json::Value {
    json!({"id": 7, "username": "alice", "name": "Alice", "web_url": "https://gitlab.com/alice"})
}

fn issue_json(iid: u64, state: &str) -> String {
    json!({
        "id": 500 + iid,
        "iid": iid,
        "title": "X",
        "description": null,
        "state": state,
        "labels": ["bug", "backend"],
        "author": author(),
        "assignees": [],
        "web_url": format!("https://gitlab.com/g/p/-/issues/{}", iid),
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z",
        "closed_at": null
    })
    .to_string()
}

fn merge_request_json(title: &str, state: &str, merged_at: Option<&str>) -> String {
    json!({
        "id": 900,
        "iid": 3,
        "title": title,
        "description": "desc",
        "state": state,
        "source_branch": "feature",
        "target_branch": "main",
        "author": author(),
        "reviewers": [author()],
        "labels": [],
        "draft": null,
        "work_in_progress": true,
        "merge_status": "can_be_merged",
        "detailed_merge_status": "not_approved",
        "merged_at": merged_at,
        "web_url": "https://gitlab.com/g/p/-/merge_requests/3",
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z"
    })
    .to_string()
}

#[tokio::test]
async fn test_issue_create_then_close() {
    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", "/projects/42/issues")
        .match_query(Matcher::Any)
        .match_header("private-token", "glpat-test")
        .match_body(Matcher::PartialJson(json!({"title": "X"})))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(issue_json(1, "opened"))
        .create_async()
        .await;
    let close = server
        .mock("PUT", "/projects/42/issues/1")
        .match_query(Matcher::Any)
        .match_body(Matcher::PartialJson(json!({"state_event": "close"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(issue_json(1, "closed"))
        .create_async()
        .await;

    let gitlab = provider(&server);
    let created = gitlab
        .create_issue(
            "42",
            &CreateIssueParams {
                title: "X".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(created.state, IssueState::Open);
    assert_eq!(created.labels, vec!["bug".to_string(), "backend".to_string()]);

    let closed = gitlab
        .update_issue(
            "42",
            1,
            &UpdateIssueParams {
                state: Some(IssueState::Closed),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(closed.state, IssueState::Closed);

    create.assert_async().await;
    close.assert_async().await;
}

#[tokio::test]
async fn test_unknown_assignee_is_a_validation_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/users")
        .match_query(Matcher::UrlEncoded("username".into(), "ghost".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .create_async()
        .await;
    let create = server
        .mock("POST", "/projects/42/issues")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let err = provider(&server)
        .create_issue(
            "42",
            &CreateIssueParams {
                title: "X".to_string(),
                assignees: vec!["ghost".to_string()],
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationError);
    assert!(err.message.contains("ghost"));
    create.assert_async().await;
}

#[tokio::test]
async fn test_commit_then_read_back() {
    let mut server = Server::new_async().await;
    let commit = server
        .mock("POST", "/projects/42/repository/commits")
        .match_query(Matcher::Any)
        .match_body(Matcher::PartialJson(json!({
            "branch": "main",
            "commit_message": "add a",
            "actions": [{"action": "create", "file_path": "a.txt", "content": "hi", "encoding": "text"}]
        })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "id": "abcdef0123456789abcdef0123456789abcdef01",
                "short_id": "abcdef01",
                "message": "add a",
                "author_name": "Alice",
                "author_email": "alice@example.com",
                "authored_date": "2024-01-01T00:00:00Z",
                "stats": {"additions": 1, "deletions": 0, "total": 1},
                "web_url": "https://gitlab.com/g/p/-/commit/abcdef01"
            })
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("GET", "/projects/42/repository/files/a.txt")
        .match_query(Matcher::UrlEncoded("ref".into(), "main".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "file_name": "a.txt",
                "file_path": "a.txt",
                "size": 2,
                "encoding": "base64",
                "content": "aGk=",
                "blob_id": "b10b"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let gitlab = provider(&server);
    let created = gitlab
        .commit(
            "42",
            &CommitParams {
                branch: "main".to_string(),
                message: "add a".to_string(),
                actions: vec![FileAction::create("a.txt", "hi")],
                base_branch: None,
                author: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(created.short_sha, "abcdef0");
    assert_eq!(created.stats.map(|s| s.total), Some(1));
    commit.assert_async().await;

    match gitlab.get_content("42", "a.txt", Some("main")).await.unwrap() {
        Content::File(file) => {
            assert_eq!(file.content, "hi");
            assert_eq!(file.sha, "b10b");
        }
        other => panic!("expected a file, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_commit_rejected() {
    let server = Server::new_async().await;
    let err = provider(&server)
        .commit(
            "42",
            &CommitParams {
                branch: "main".to_string(),
                message: "nothing".to_string(),
                actions: vec![],
                base_branch: None,
                author: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::BadRequest);
}

#[tokio::test]
async fn test_content_falls_back_to_directory_listing() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/projects/42/repository/files/src")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(json!({"message": "404 File Not Found"}).to_string())
        .create_async()
        .await;
    let tree = server
        .mock("GET", "/projects/42/repository/tree")
        .match_query(Matcher::UrlEncoded("path".into(), "src".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!([
                {"id": "a1", "name": "lib.rs", "type": "blob", "path": "src/lib.rs", "mode": "100644"},
                {"id": "b2", "name": "net", "type": "tree", "path": "src/net", "mode": "040000"}
            ])
            .to_string(),
        )
        .create_async()
        .await;

    match provider(&server).get_content("42", "src", None).await.unwrap() {
        Content::Directory(dir) => {
            assert_eq!(dir.path, "src");
            assert_eq!(dir.entries.len(), 2);
            assert_eq!(dir.entries[0].entry_type, EntryType::File);
            assert_eq!(dir.entries[1].entry_type, EntryType::Directory);
        }
        other => panic!("expected a directory, got {:?}", other),
    }
    tree.assert_async().await;
}

#[tokio::test]
async fn test_missing_path_is_not_found() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/projects/42/repository/files/nope")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(json!({"message": "404 File Not Found"}).to_string())
        .create_async()
        .await;
    server
        .mock("GET", "/projects/42/repository/tree")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .create_async()
        .await;

    let err = provider(&server).get_content("42", "nope", None).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
    assert_eq!(err.code_str(), "NOT_FOUND");
}

#[tokio::test]
async fn test_merge_request_normalization() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/projects/42/merge_requests/3")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(merge_request_json("Draft: Y", "closed", Some("2024-01-05T00:00:00Z")))
        .create_async()
        .await;

    let mr = provider(&server).get_pull_request("42", 3).await.unwrap();
    assert_eq!(mr.state, PullRequestState::Merged);
    // detailed_merge_status wins over the legacy merge_status
    assert!(!mr.mergeable);
    // draft is null, so the legacy work_in_progress flag decides
    assert!(mr.draft);
    assert_eq!(mr.reviewers.len(), 1);
}

#[tokio::test]
async fn test_draft_merge_request_title_prefix() {
    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", "/projects/42/merge_requests")
        .match_query(Matcher::Any)
        .match_body(Matcher::PartialJson(json!({
            "title": "Draft: Y",
            "source_branch": "feature",
            "target_branch": "main"
        })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(merge_request_json("Draft: Y", "opened", None))
        .create_async()
        .await;

    let mr = provider(&server)
        .create_pull_request(
            "42",
            &CreatePullRequestParams {
                title: "Y".to_string(),
                source_branch: "feature".to_string(),
                target_branch: "main".to_string(),
                description: None,
                draft: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(mr.state, PullRequestState::Open);
    create.assert_async().await;
}

#[tokio::test]
async fn test_diff_stats_derived_from_patch() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/projects/42/merge_requests/3/diffs")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!([{
                "old_path": "a.rs",
                "new_path": "a.rs",
                "new_file": false,
                "renamed_file": false,
                "deleted_file": false,
                "diff": "@@ -1,2 +1,3 @@\n-old\n+new\n+more\n ctx\n"
            }])
            .to_string(),
        )
        .create_async()
        .await;

    let diffs = provider(&server)
        .get_pull_request_diffs("42", 3, &Pagination::default())
        .await
        .unwrap();
    assert_eq!(diffs.len(), 1);
    assert_eq!((diffs[0].additions, diffs[0].deletions), (2, 1));
}

#[tokio::test]
async fn test_list_jobs_failed_filter() {
    let mut server = Server::new_async().await;
    let jobs_mock = server
        .mock("GET", "/projects/42/pipelines/7/jobs")
        .match_query(Matcher::UrlEncoded("scope[]".into(), "failed".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!([
                {"id": 1, "name": "test", "stage": "test", "status": "failed",
                 "started_at": "2024-01-01T00:00:10Z", "finished_at": "2024-01-01T00:00:05Z"},
                {"id": 2, "name": "lint", "stage": "test", "status": "success"},
                {"id": 3, "name": "deploy", "stage": "deploy", "status": "created"}
            ])
            .to_string(),
        )
        .create_async()
        .await;

    let jobs = provider(&server)
        .list_jobs(
            "42",
            7,
            &JobFilter {
                status: Some(PipelineStatus::Failed),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(jobs.len(), 1);
    assert!(jobs.iter().all(|j| j.status == PipelineStatus::Failed));
    // clock skew is reported as-is
    assert_eq!(jobs[0].duration_seconds, Some(-5));
    jobs_mock.assert_async().await;
}

#[tokio::test]
async fn test_job_log_is_raw_text() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/projects/42/jobs/9/trace")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_body("$ cargo test\nok\n")
        .create_async()
        .await;

    let log = provider(&server).get_job_log("42", 9).await.unwrap();
    assert_eq!(log, "$ cargo test\nok\n");
}

#[tokio::test]
async fn test_error_mapping() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/user")
        .match_query(Matcher::Any)
        .with_status(401)
        .with_body(json!({"message": "401 Unauthorized"}).to_string())
        .create_async()
        .await;
    server
        .mock("GET", "/projects/42/pipelines/1")
        .match_query(Matcher::Any)
        .with_status(502)
        .with_body("<html>Bad Gateway</html>")
        .create_async()
        .await;

    let gitlab = provider(&server);
    let err = gitlab.get_me().await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Unauthorized);
    assert_eq!(err.message, "401 Unauthorized");
    assert!(!err.retryable());

    let err = gitlab.get_pipeline("42", 1).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ServerError);
    assert_eq!(err.status, Some(502));
    assert!(err.retryable());
}

#[tokio::test]
async fn test_blank_token_fails_before_request() {
    let mut server = Server::new_async().await;
    let any = server
        .mock("GET", Matcher::Any)
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let gitlab = GitLabProvider::new(
        &server.url(),
        Arc::new(StaticTokenAuth::named("PRIVATE-TOKEN", "  ")),
        Duration::from_secs(5),
    )
    .unwrap();
    let err = gitlab.get_me().await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Unauthorized);
    any.assert_async().await;
}

#[tokio::test]
async fn test_invalid_project_rejected() {
    let server = Server::new_async().await;
    let err = provider(&server).get_issue("project-only", 1).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::BadRequest);
}

#[tokio::test]
async fn test_pending_pipeline_filter_stays_local() {
    let mut server = Server::new_async().await;
    let pipelines = server
        .mock("GET", "/projects/42/pipelines")
        .match_query(Matcher::Missing("status".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!([
                {"id": 1, "status": "created", "ref": "main", "sha": "abc", "created_at": "2024-01-01T00:00:00Z"},
                {"id": 2, "status": "success", "ref": "main", "sha": "abd", "created_at": "2024-01-01T00:00:00Z"},
                {"id": 3, "status": "waiting_for_resource", "ref": "main", "sha": "abe", "created_at": "2024-01-01T00:00:00Z"}
            ])
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let found = provider(&server)
        .list_pipelines(
            "42",
            &PipelineFilter {
                status: Some(PipelineStatus::Pending),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(found.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 3]);
    pipelines.assert_async().await;
}

#[tokio::test]
async fn test_large_directory_is_listed_across_pages() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/projects/42/repository/files/big")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(json!({"message": "404 File Not Found"}).to_string())
        .create_async()
        .await;
    let entries = |range: std::ops::Range<u32>| {
        serde_json::Value::Array(
            range
                .map(|i| json!({"id": format!("{:040}", i), "name": format!("f{}.txt", i), "type": "blob", "path": format!("big/f{}.txt", i), "mode": "100644"}))
                .collect(),
        )
        .to_string()
    };
    let first = server
        .mock("GET", "/projects/42/repository/tree")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("path".into(), "big".into()),
            Matcher::UrlEncoded("page".into(), "1".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_header("x-next-page", "2")
        .with_header("x-total", "150")
        .with_body(entries(0..100))
        .expect(1)
        .create_async()
        .await;
    let second = server
        .mock("GET", "/projects/42/repository/tree")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("path".into(), "big".into()),
            Matcher::UrlEncoded("page".into(), "2".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(entries(100..150))
        .expect(1)
        .create_async()
        .await;

    match provider(&server).get_content("42", "big", None).await.unwrap() {
        Content::Directory(dir) => {
            assert_eq!(dir.entries.len(), 150);
            assert_eq!(dir.entries[149].path, "big/f149.txt");
        }
        other => panic!("expected a directory, got {:?}", other),
    }
    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn test_slow_backend_times_out_as_408() {
    // Accepts connections but never answers.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let gitlab = GitLabProvider::new(
        &format!("http://{}", addr),
        Arc::new(StaticTokenAuth::named("PRIVATE-TOKEN", "glpat-test")),
        Duration::from_millis(500),
    )
    .unwrap();
    let err = gitlab.get_me().await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Timeout);
    assert_eq!(err.status, Some(408));
    drop(listener);
}
