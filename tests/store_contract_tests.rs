use std::sync::Arc;

use mongodb::bson::doc;
use serde_json::json;

use quizhub_server::{
    db::{DocPath, DocumentStore, MemoryDocumentStore},
    errors::AppError,
    models::dto::request::CreateQuizRequest,
    repositories::QuizRepository,
    services::QuizService,
};

fn quiz_request(title: &str) -> CreateQuizRequest {
    CreateQuizRequest {
        title: title.to_string(),
        description: "D".to_string(),
        questions: Some(vec![json!({ "q": "2+2", "a": "4" })]),
        required_fields: Some(vec![json!("email")]),
    }
}

fn registry() -> (Arc<QuizService>, QuizRepository, Arc<dyn DocumentStore>) {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
    (
        Arc::new(QuizService::new(Arc::clone(&store), 64)),
        QuizRepository::new(Arc::clone(&store)),
        store,
    )
}

async fn assert_copies_agree(repository: &QuizRepository, owner: &str, quiz_id: &str) -> bool {
    let owner_copy = repository.find_owner_copy(owner, quiz_id).await.unwrap().unwrap();
    let index = repository.find_index(quiz_id).await.unwrap().unwrap();

    assert_eq!(owner_copy.is_public, index.is_public);
    assert_eq!(owner_copy.title, index.title);
    assert_eq!(index.user_id, owner);
    index.is_public
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_toggles_are_serialized() {
    let (service, repository, _) = registry();
    let quiz_id = service.create("alice", quiz_request("T")).await.unwrap();

    for tasks in [7usize, 8] {
        let before = assert_copies_agree(&repository, "alice", &quiz_id).await;

        let handles: Vec<_> = (0..tasks)
            .map(|_| {
                let service = Arc::clone(&service);
                let quiz_id = quiz_id.clone();
                tokio::spawn(async move { service.toggle_public("alice", &quiz_id).await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let after = assert_copies_agree(&repository, "alice", &quiz_id).await;
        assert_eq!(after, before ^ (tasks % 2 == 1), "{} concurrent toggles", tasks);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_toggle_and_delete_never_leave_half_a_quiz() {
    let (service, repository, _) = registry();
    let quiz_id = service.create("alice", quiz_request("T")).await.unwrap();

    let toggles: Vec<_> = (0..6)
        .map(|_| {
            let service = Arc::clone(&service);
            let quiz_id = quiz_id.clone();
            tokio::spawn(async move { service.toggle_public("alice", &quiz_id).await })
        })
        .collect();
    let delete = {
        let service = Arc::clone(&service);
        let quiz_id = quiz_id.clone();
        tokio::spawn(async move { service.delete("alice", &quiz_id).await })
    };

    delete.await.unwrap().unwrap();
    for handle in toggles {
        match handle.await.unwrap() {
            Ok(_) | Err(AppError::NotFound(_)) => {}
            Err(other) => panic!("unexpected toggle failure: {:?}", other),
        }
    }

    assert!(repository.find_index(&quiz_id).await.unwrap().is_none());
    assert!(repository.find_owner_copy("alice", &quiz_id).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_get_distinct_ids() {
    let (service, repository, _) = registry();

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.create("alice", quiz_request(&format!("T{}", i))).await })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 10);

    let listed = repository.list_for_owner("alice").await.unwrap();
    assert_eq!(listed.len(), 10);
    for quiz in &listed {
        assert!(!quiz.is_public);
        assert!(repository.find_index(&quiz.quiz_id).await.unwrap().is_some());
    }
}

#[tokio::test]
async fn test_delete_by_non_owner_leaves_both_copies() {
    let (service, repository, _) = registry();
    let quiz_id = service.create("alice", quiz_request("T")).await.unwrap();

    let result = service.delete("mallory", &quiz_id).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    assert!(repository.find_index(&quiz_id).await.unwrap().is_some());
    assert!(repository.find_owner_copy("alice", &quiz_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_public_view_matches_owner_copy() {
    let (service, _, _) = registry();
    let quiz_id = service.create("alice", quiz_request("Arithmetic")).await.unwrap();
    service.toggle_public("alice", &quiz_id).await.unwrap();

    let quiz = service.get_public(&quiz_id).await.unwrap();
    assert_eq!(quiz["quizId"], json!(quiz_id));
    assert_eq!(quiz["title"], json!("Arithmetic"));
    assert_eq!(quiz["isPublic"], json!(true));
    assert_eq!(quiz["questions"], json!([{ "q": "2+2", "a": "4" }]));
    assert!(quiz.get("userId").is_none());
}

#[tokio::test]
async fn test_store_paths_and_listing() {
    let store = MemoryDocumentStore::new();
    let user = DocPath::new("users", "u1").unwrap();
    let quiz = user.child("quizzes", "q1").unwrap();

    assert_eq!(quiz.path(), "users/u1/quizzes/q1");
    assert_eq!(quiz.collection(), "users/u1/quizzes");
    assert_eq!(quiz.leaf_collection(), "quizzes");
    assert!(DocPath::new("users", "a/b").is_err());
    assert!(DocPath::new("users", "").is_err());

    store.set(&quiz, doc! { "title": "T" }).await.unwrap();
    store.set(&DocPath::new("quizzes", "q1").unwrap(), doc! { "title": "top" }).await.unwrap();

    let nested = store.list("users/u1/quizzes").await.unwrap();
    assert_eq!(nested.len(), 1);
    assert_eq!(nested[0].0, "q1");
    assert_eq!(nested[0].1.get_str("title").unwrap(), "T");

    let top = store.list("quizzes").await.unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].1.get_str("title").unwrap(), "top");
}
