use blog_portal::{
    error::StoreError,
    models::{
        Blog, BlogStatus, CreateBlogRequest, ErrorResponse, MAX_TAG_LEN, RegisterUserRequest,
        StatusChangeResponse, User, UserInfo,
    },
};

fn register_request() -> RegisterUserRequest {
    RegisterUserRequest {
        phone_number: "+79990001122".to_string(),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        email: "ada@example.com".to_string(),
        password: "secret1".to_string(),
        confirm_password: "secret1".to_string(),
    }
}

fn blog_with(author: i64, status: BlogStatus) -> Blog {
    Blog {
        id: 1,
        author,
        status,
        ..Blog::default()
    }
}

// --- BlogStatus ---

#[test]
fn test_status_parses_exact_values_only() {
    assert_eq!("draft".parse::<BlogStatus>().unwrap(), BlogStatus::Draft);
    assert_eq!("published".parse::<BlogStatus>().unwrap(), BlogStatus::Published);

    for bad in ["Draft", "PUBLISHED", " draft", "archived", ""] {
        assert!(
            matches!(bad.parse::<BlogStatus>(), Err(StoreError::InvalidStatus)),
            "{bad:?} should be rejected"
        );
    }
}

#[test]
fn test_status_transition_to_same_is_noop() {
    assert!(matches!(
        BlogStatus::Draft.transition_to(BlogStatus::Draft),
        Err(StoreError::NoOp)
    ));
    assert_eq!(
        BlogStatus::Draft.transition_to(BlogStatus::Published).unwrap(),
        BlogStatus::Published
    );
    assert_eq!(
        BlogStatus::Published.transition_to(BlogStatus::Draft).unwrap(),
        BlogStatus::Draft
    );
}

#[test]
fn test_status_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&BlogStatus::Draft).unwrap(), "\"draft\"");
    assert_eq!(BlogStatus::Published.to_string(), "published");
    assert_eq!(BlogStatus::default(), BlogStatus::Published);
}

// --- Visibility & Ownership ---

#[test]
fn test_published_blog_visible_to_everyone() {
    let blog = blog_with(1, BlogStatus::Published);
    assert!(blog.ensure_visible_to(None).is_ok());
    assert!(blog.ensure_visible_to(Some(2)).is_ok());
}

#[test]
fn test_draft_visible_to_author_only() {
    let blog = blog_with(1, BlogStatus::Draft);
    assert!(blog.ensure_visible_to(Some(1)).is_ok());
    assert!(matches!(
        blog.ensure_visible_to(Some(2)),
        Err(StoreError::Forbidden)
    ));
    assert!(matches!(
        blog.ensure_visible_to(None),
        Err(StoreError::Forbidden)
    ));
}

#[test]
fn test_ownership_check() {
    let blog = blog_with(1, BlogStatus::Published);
    assert!(blog.ensure_owned_by(1).is_ok());
    assert!(matches!(blog.ensure_owned_by(2), Err(StoreError::Forbidden)));
}

#[test]
fn test_elevated_roles() {
    let with_role = |role_id| User {
        role_id,
        ..User::default()
    };
    assert!(!with_role(1).is_elevated());
    assert!(with_role(2).is_elevated());
    assert!(with_role(3).is_elevated());
    assert!(!with_role(4).is_elevated());
}

// --- Request Validation ---

#[test]
fn test_register_request_valid() {
    assert!(register_request().validate().is_ok());
}

#[test]
fn test_register_request_password_rules() {
    let mut short = register_request();
    short.password = "abcd".to_string();
    short.confirm_password = "abcd".to_string();
    assert!(short.validate().is_err());

    let mut long = register_request();
    long.password = "x".repeat(51);
    long.confirm_password = long.password.clone();
    assert!(long.validate().is_err());

    let mut mismatch = register_request();
    mismatch.confirm_password = "other1".to_string();
    assert_eq!(mismatch.validate().unwrap_err(), "Passwords do not match");
}

#[test]
fn test_register_request_requires_email_shape() {
    let mut req = register_request();
    req.email = "not-an-email".to_string();
    assert!(req.validate().is_err());
}

#[test]
fn test_create_blog_request_defaults() {
    let req: CreateBlogRequest =
        serde_json::from_str(r#"{"title":"T","content":"C","short_description":"S"}"#).unwrap();

    assert!(req.tags.is_empty());
    assert_eq!(req.status, BlogStatus::Published);
}

#[test]
fn test_create_blog_request_rejects_unknown_status() {
    let result: Result<CreateBlogRequest, _> = serde_json::from_str(
        r#"{"title":"T","content":"C","short_description":"S","status":"archived"}"#,
    );
    assert!(result.is_err());
}

#[test]
fn test_create_blog_request_validation() {
    let blank_title = CreateBlogRequest {
        title: "   ".to_string(),
        ..CreateBlogRequest::default()
    };
    assert!(blank_title.validate().is_err());

    let long_tag = CreateBlogRequest {
        title: "T".to_string(),
        tags: vec!["x".repeat(MAX_TAG_LEN + 1)],
        ..CreateBlogRequest::default()
    };
    assert!(long_tag.validate().is_err());
}

#[test]
fn test_tag_length_counted_after_lowercasing() {
    // 'İ' lower-cases to two characters.
    let tag = "İ".repeat(MAX_TAG_LEN);
    assert_eq!(tag.chars().count(), MAX_TAG_LEN);

    let expanding = CreateBlogRequest {
        title: "T".to_string(),
        tags: vec![tag],
        ..CreateBlogRequest::default()
    };
    assert!(expanding.validate().is_err());

    let at_limit = CreateBlogRequest {
        title: "T".to_string(),
        tags: vec![format!("  {}  ", "R".repeat(MAX_TAG_LEN))],
        ..CreateBlogRequest::default()
    };
    assert!(at_limit.validate().is_ok());
}

#[test]
fn test_cleaned_tags_trim_and_drop_blanks() {
    let req = CreateBlogRequest {
        title: "T".to_string(),
        tags: vec![" Rust ".to_string(), "".to_string(), "  ".to_string(), "web".to_string()],
        ..CreateBlogRequest::default()
    };
    assert_eq!(req.cleaned_tags(), vec!["Rust".to_string(), "web".to_string()]);

    let new_blog = req.into_new_blog(42);
    assert_eq!(new_blog.author, 42);
    assert_eq!(new_blog.title, "T");
}

// --- Output Shapes ---

#[test]
fn test_user_info_never_exposes_password_hash() {
    let user = User {
        id: 1,
        email: "a@b.c".to_string(),
        password_hash: "$argon2id$secret".to_string(),
        role_id: 2,
        ..User::default()
    };
    let json = serde_json::to_string(&UserInfo::from(&user)).unwrap();

    assert!(!json.contains("argon2"));
    assert!(json.contains("\"role_id\":2"));
}

#[test]
fn test_response_shapes() {
    let change = StatusChangeResponse {
        id: 3,
        status: BlogStatus::Draft,
        changed: false,
    };
    assert_eq!(
        serde_json::to_value(&change).unwrap(),
        serde_json::json!({"id": 3, "status": "draft", "changed": false})
    );

    let err = ErrorResponse {
        detail: "Resource not found".to_string(),
    };
    assert_eq!(
        serde_json::to_string(&err).unwrap(),
        r#"{"detail":"Resource not found"}"#
    );
}
