// tests/api_tests.rs

use classroom_backend::{
    config::Config,
    db, routes,
    state::AppState,
    utils::jwt::{ROLE_STUDENT, ROLE_TEACHER, sign_jwt},
};
use reqwest::StatusCode;
use serde_json::{Value, json};

const SECRET: &str = "test_secret_for_integration_tests";

struct TestApp {
    address: String,
    client: reqwest::Client,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}/api/quizzes{}", self.address, path)
    }

    fn token(&self, username: &str, role: &str) -> String {
        sign_jwt(username, role, SECRET, 600).unwrap()
    }

    fn teacher(&self) -> String {
        self.token("ms_rao", ROLE_TEACHER)
    }

    fn student(&self, name: &str) -> String {
        self.token(name, ROLE_STUDENT)
    }

    async fn create_quiz(&self, body: Value) -> Value {
        let response = self
            .client
            .post(self.url(""))
            .bearer_auth(self.teacher())
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json().await.unwrap()
    }

    async fn submit(&self, token: &str, quiz_id: i64, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/{}/submit", quiz_id)))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    async fn get(&self, token: &str, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request")
    }
}

/// Spawns the app on a random port over a fresh in-memory database.
async fn spawn_app() -> TestApp {
    let pool = db::connect_in_memory()
        .await
        .expect("Failed to open in-memory database");
    db::migrate(&pool).await.expect("Failed to migrate database");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: SECRET.to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        log_dir: "logs".to_string(),
        submit_timeout_secs: 5,
    };

    let app = routes::create_router(AppState { pool, config });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
    }
}

/// Question `i` has correct option `i % 4`.
fn quiz_body(questions: usize, passing_score: f64, allow_retake: bool, show_answers: bool) -> Value {
    let questions: Vec<Value> = (0..questions)
        .map(|i| {
            json!({
                "text": format!("Question {}", i + 1),
                "options": ["a", "b", "c", "d"],
                "correctAnswer": i % 4,
                "explanation": format!("Because of rule {}", i + 1),
            })
        })
        .collect();

    json!({
        "title": "Weekly test",
        "description": "Chapter 3",
        "subject": "Mathematics",
        "classLevel": "6",
        "questions": questions,
        "timeLimit": 15,
        "passingScore": passing_score,
        "allowRetake": allow_retake,
        "showCorrectAnswers": show_answers,
    })
}

fn question_ids(quiz: &Value) -> Vec<i64> {
    quiz["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["id"].as_i64().unwrap())
        .collect()
}

/// `correct` picks how many leading questions are answered correctly; the rest
/// get a wrong option.
fn answers(ids: &[i64], correct: usize) -> Vec<Value> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| {
            let right = (i % 4) as i64;
            let pick = if i < correct { right } else { (right + 1) % 4 };
            json!({"questionId": id, "selectedAnswer": pick})
        })
        .collect()
}

#[tokio::test]
async fn health_check_404() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(format!("{}/random_path_that_does_not_exist", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn requests_without_token_are_rejected() {
    let app = spawn_app().await;

    let response = app.client.get(app.url("")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "unauthorized");
}

#[tokio::test]
async fn create_rejects_invalid_question_with_index() {
    let app = spawn_app().await;
    let mut body = quiz_body(3, 60.0, false, true);
    body["questions"][1]["correctAnswer"] = json!(7);

    let response = app
        .client
        .post(app.url(""))
        .bearer_auth(app.teacher())
        .json(&body)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "validation");
    assert_eq!(body["details"][0]["questionIndex"], 1);
    assert_eq!(body["details"][0]["field"], "correctAnswer");
}

#[tokio::test]
async fn students_cannot_author_or_manage() {
    let app = spawn_app().await;
    let student = app.student("asha");

    let response = app
        .client
        .post(app.url(""))
        .bearer_auth(&student)
        .json(&quiz_body(2, 60.0, false, true))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let quiz = app.create_quiz(quiz_body(2, 60.0, false, true)).await;
    let id = quiz["id"].as_i64().unwrap();
    let response = app.get(&student, &format!("/{}/manage", id)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn take_view_matches_definition_without_answers() {
    let app = spawn_app().await;
    let created = app.create_quiz(quiz_body(3, 60.0, false, true)).await;
    let id = created["id"].as_i64().unwrap();
    assert_eq!(created["totalQuestions"], 3);

    let taken: Value = app
        .get(&app.student("asha"), &format!("/{}/take", id))
        .await
        .json()
        .await
        .unwrap();

    let mut expected = created.clone();
    for q in expected["questions"].as_array_mut().unwrap() {
        let q = q.as_object_mut().unwrap();
        q.remove("correctAnswer");
        q.remove("explanation");
    }
    assert_eq!(taken, expected);
}

#[tokio::test]
async fn grading_three_of_four() {
    let app = spawn_app().await;
    let quiz = app.create_quiz(quiz_body(4, 60.0, false, true)).await;
    let id = quiz["id"].as_i64().unwrap();
    let ids = question_ids(&quiz);

    let response = app
        .submit(
            &app.student("asha"),
            id,
            json!({"studentId": "asha", "answers": answers(&ids, 3), "timeTakenMinutes": 6}),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let result: Value = response.json().await.unwrap();
    assert_eq!(result["score"], 3);
    assert_eq!(result["totalQuestions"], 4);
    assert_eq!(result["percentage"], 75.0);
    assert_eq!(result["passed"], true);
    assert_eq!(result["timeTaken"], 6);
    assert_eq!(result["detailedAnswers"].as_array().unwrap().len(), 4);
    assert_eq!(result["detailedAnswers"][3]["isCorrect"], false);
}

#[tokio::test]
async fn unanswered_questions_count_and_boundary_passes() {
    let app = spawn_app().await;
    let quiz = app.create_quiz(quiz_body(5, 60.0, false, false)).await;
    let id = quiz["id"].as_i64().unwrap();
    let ids = question_ids(&quiz);

    let mut submitted = answers(&ids[..3], 3);
    submitted.push(json!({"questionId": ids[3], "selectedAnswer": -1}));
    submitted.push(json!({"questionId": ids[4], "selectedAnswer": -1}));

    let result: Value = app
        .submit(
            &app.student("asha"),
            id,
            json!({"studentId": "asha", "answers": submitted, "timeTakenMinutes": 3}),
        )
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(result["score"], 3);
    assert_eq!(result["percentage"], 60.0);
    assert_eq!(result["passed"], true);
    assert!(result.get("detailedAnswers").is_none());
}

#[tokio::test]
async fn retake_policy_is_enforced() {
    let app = spawn_app().await;
    let student = app.student("ravi");
    let payload = |ids: &[i64]| json!({"studentId": "ravi", "answers": answers(ids, 1), "timeTakenMinutes": 2});

    let strict = app.create_quiz(quiz_body(2, 60.0, false, true)).await;
    let strict_id = strict["id"].as_i64().unwrap();
    let strict_ids = question_ids(&strict);

    let first = app.submit(&student, strict_id, payload(&strict_ids)).await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let second = app.submit(&student, strict_id, payload(&strict_ids)).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body: Value = second.json().await.unwrap();
    assert_eq!(body["kind"], "retake_denied");
    assert_eq!(
        body["error"],
        "You have already attempted this quiz. Retakes are not allowed."
    );

    let lenient = app.create_quiz(quiz_body(2, 60.0, true, true)).await;
    let lenient_id = lenient["id"].as_i64().unwrap();
    let lenient_ids = question_ids(&lenient);
    for _ in 0..2 {
        let response = app.submit(&student, lenient_id, payload(&lenient_ids)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let history: Value = app.get(&student, "/attempts/ravi").await.json().await.unwrap();
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 3);
    // Newest first, with quiz metadata joined in.
    assert_eq!(history[0]["quizId"], lenient_id);
    assert_eq!(history[2]["quizId"], strict_id);
    assert_eq!(history[0]["quiz"]["title"], "Weekly test");
    assert!(history[0].get("detailedAnswers").is_none());
}

#[tokio::test]
async fn submissions_are_checked() {
    let app = spawn_app().await;
    let quiz = app.create_quiz(quiz_body(2, 60.0, true, true)).await;
    let id = quiz["id"].as_i64().unwrap();
    let ids = question_ids(&quiz);
    let student = app.student("asha");

    let foreign = app
        .submit(
            &student,
            id,
            json!({"studentId": "asha", "answers": [{"questionId": 9999, "selectedAnswer": 0}]}),
        )
        .await;
    assert_eq!(foreign.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = foreign.json().await.unwrap();
    assert_eq!(body["kind"], "invalid_answer");

    let out_of_range = app
        .submit(
            &student,
            id,
            json!({"studentId": "asha", "answers": [{"questionId": ids[0], "selectedAnswer": 4}]}),
        )
        .await;
    assert_eq!(out_of_range.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let impersonation = app
        .submit(
            &student,
            id,
            json!({"studentId": "ravi", "answers": answers(&ids, 2)}),
        )
        .await;
    assert_eq!(impersonation.status(), StatusCode::FORBIDDEN);

    let missing = app
        .submit(&student, 4242, json!({"studentId": "asha", "answers": []}))
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    // Nothing above reached the ledger.
    let history: Value = app.get(&student, "/attempts/asha").await.json().await.unwrap();
    assert!(history.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn total_questions_follows_updates_and_ids_survive() {
    let app = spawn_app().await;
    let quiz = app.create_quiz(quiz_body(2, 60.0, false, true)).await;
    let id = quiz["id"].as_i64().unwrap();
    let ids = question_ids(&quiz);

    let mut questions = quiz["questions"].as_array().unwrap().clone();
    questions.push(json!({"text": "Question 3", "options": ["x", "y"], "correctAnswer": 1}));

    let response = app
        .client
        .put(app.url(&format!("/{}", id)))
        .bearer_auth(app.teacher())
        .json(&json!({"questions": questions}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["totalQuestions"], 3);
    assert_eq!(&question_ids(&updated)[..2], &ids[..]);

    let response = app
        .client
        .put(app.url(&format!("/{}", id)))
        .bearer_auth(app.teacher())
        .json(&json!({"questions": [updated["questions"][1]]}))
        .send()
        .await
        .unwrap();
    let trimmed: Value = response.json().await.unwrap();
    assert_eq!(trimmed["totalQuestions"], 1);
    assert_eq!(question_ids(&trimmed), vec![ids[1]]);

    let managed: Value = app
        .get(&app.teacher(), &format!("/{}/manage", id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(managed["totalQuestions"], 1);
    assert_eq!(managed["questions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn only_the_creator_may_edit() {
    let app = spawn_app().await;
    let quiz = app.create_quiz(quiz_body(2, 60.0, false, true)).await;
    let id = quiz["id"].as_i64().unwrap();

    let response = app
        .client
        .put(app.url(&format!("/{}", id)))
        .bearer_auth(app.token("mr_patil", ROLE_TEACHER))
        .json(&json!({"title": "Hijacked"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .client
        .put(app.url(&format!("/{}", id)))
        .bearer_auth(app.teacher())
        .json(&json!({"title": "  "}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deactivated_quiz_is_hidden_from_students() {
    let app = spawn_app().await;
    let quiz = app.create_quiz(quiz_body(2, 60.0, false, true)).await;
    let id = quiz["id"].as_i64().unwrap();
    let student = app.student("asha");

    let response = app
        .client
        .post(app.url(&format!("/{}/deactivate", id)))
        .bearer_auth(app.teacher())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["active"], false);

    let response = app.get(&student, &format!("/{}/take", id)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let listed: Value = app
        .get(&student, "?includeInactive=true")
        .await
        .json()
        .await
        .unwrap();
    assert!(listed.as_array().unwrap().is_empty());

    let listed: Value = app
        .get(&app.teacher(), "?includeInactive=true&subject=Mathematics")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["questions"][0]["correctAnswer"], 0);

    let ids = question_ids(&quiz);
    let response = app
        .submit(&student, id, json!({"studentId": "asha", "answers": answers(&ids, 2)}))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn students_list_without_answer_keys() {
    let app = spawn_app().await;
    app.create_quiz(quiz_body(2, 60.0, false, true)).await;
    let mut science = quiz_body(1, 60.0, false, true);
    science["subject"] = json!("Science");
    app.create_quiz(science).await;

    let listed: Value = app
        .get(&app.student("asha"), "?classLevel=6")
        .await
        .json()
        .await
        .unwrap();
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 2);
    // Newest first.
    assert_eq!(listed[0]["subject"], "Science");
    assert!(listed[0]["questions"][0].get("correctAnswer").is_none());

    let filtered: Value = app
        .get(&app.student("asha"), "?subject=Science")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(filtered.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn delete_cascades_to_attempts() {
    let app = spawn_app().await;
    let quiz = app.create_quiz(quiz_body(2, 60.0, true, true)).await;
    let id = quiz["id"].as_i64().unwrap();
    let ids = question_ids(&quiz);

    for n in 0..10 {
        let name = format!("student{}", n);
        let response = app
            .submit(
                &app.student(&name),
                id,
                json!({"studentId": name, "answers": answers(&ids, n % 3)}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let attempts: Value = app
        .get(&app.teacher(), &format!("/{}/attempts", id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(attempts.as_array().unwrap().len(), 10);

    let response = app
        .client
        .delete(app.url(&format!("/{}", id)))
        .bearer_auth(app.teacher())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["attemptsRemoved"], 10);

    let history: Value = app
        .get(&app.student("student0"), "/attempts/student0")
        .await
        .json()
        .await
        .unwrap();
    assert!(history.as_array().unwrap().is_empty());

    let response = app.get(&app.teacher(), &format!("/{}/attempts", id)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn attempt_review_respects_show_correct_answers() {
    let app = spawn_app().await;
    let quiz = app.create_quiz(quiz_body(2, 60.0, false, false)).await;
    let id = quiz["id"].as_i64().unwrap();
    let ids = question_ids(&quiz);
    let student = app.student("meera");

    let result: Value = app
        .submit(&student, id, json!({"studentId": "meera", "answers": answers(&ids, 1)}))
        .await
        .json()
        .await
        .unwrap();
    let attempt_id = result["attemptId"].as_i64().unwrap();

    let own: Value = app
        .get(&student, &format!("/attempt/{}", attempt_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(own["detailedAnswers"].as_array().unwrap().len(), 2);
    assert!(own["detailedAnswers"][0].get("correctAnswer").is_none());
    assert_eq!(own["detailedAnswers"][0]["userAnswer"], 0);

    let reviewed: Value = app
        .get(&app.teacher(), &format!("/attempt/{}", attempt_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(reviewed["detailedAnswers"][1]["correctAnswer"], 1);
    assert_eq!(reviewed["detailedAnswers"][1]["explanation"], "Because of rule 2");

    let response = app
        .get(&app.student("ravi"), &format!("/attempt/{}", attempt_id))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn analytics_endpoints() {
    let app = spawn_app().await;
    let quiz = app.create_quiz(quiz_body(4, 60.0, true, true)).await;
    let id = quiz["id"].as_i64().unwrap();
    let ids = question_ids(&quiz);

    // asha: 50%, then 100%, then 100% again. ravi: 25%.
    for (name, correct, minutes) in [("asha", 2, 4), ("asha", 4, 6), ("asha", 4, 5), ("ravi", 1, 9)] {
        let response = app
            .submit(
                &app.student(name),
                id,
                json!({"studentId": name, "answers": answers(&ids, correct), "timeTakenMinutes": minutes}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let stats: Value = app
        .get(&app.teacher(), &format!("/{}/stats", id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(stats["attemptCount"], 4);
    assert_eq!(stats["passCount"], 2);
    // (50 + 100 + 100 + 25) / 4 = 68.75
    assert_eq!(stats["averagePercentage"], 69);
    assert_eq!(stats["averageTimeTaken"], 6);

    let summary: Value = app
        .get(&app.student("asha"), &format!("/{}/results/asha", id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(summary["attemptCount"], 3);
    assert_eq!(summary["bestAttempt"]["percentage"], 100.0);
    // Tie on 100%: the later submission wins.
    assert_eq!(summary["bestAttempt"]["timeTaken"], 5);
    assert_eq!(summary["history"][0]["timeTaken"], 5);

    let response = app
        .get(&app.student("ravi"), &format!("/{}/results/asha", id))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.get(&app.student("asha"), &format!("/{}/stats", id)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let mut history = quiz_body(1, 60.0, true, true);
    history["subject"] = json!("History");
    let history = app.create_quiz(history).await;
    app.client
        .post(app.url(&format!("/{}/deactivate", history["id"])))
        .bearer_auth(app.teacher())
        .send()
        .await
        .unwrap();

    let overview: Value = app.get(&app.teacher(), "/overview").await.json().await.unwrap();
    assert_eq!(overview["total"], 2);
    assert_eq!(overview["active"], 1);
    assert_eq!(overview["inactive"], 1);

    let overview: Value = app
        .get(&app.teacher(), "/overview?subject=History")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(overview["total"], 1);
    assert_eq!(overview["inactive"], 1);
}

#[tokio::test]
async fn subject_catalogue_by_class() {
    let app = spawn_app().await;

    let body: Value = app
        .get(&app.student("asha"), "/subjects?classLevel=3")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["classLevel"], "3");
    assert!(
        body["subjects"]
            .as_array()
            .unwrap()
            .contains(&json!("Environmental Studies (EVS)"))
    );
}
