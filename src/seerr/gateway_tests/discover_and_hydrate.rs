fn dashboard_mock() -> Router {
    Router::new()
        .route(
            "/api/v1/media",
            get(|| async {
                Json(json!({
                    "pageInfo": {"pages": 1},
                    "results": [{"id": 1, "tmdbId": 550, "mediaType": "movie", "status": 5}]
                }))
            }),
        )
        .route(
            "/api/v1/discover/trending",
            get(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"message": "Unable to retrieve trending items."})),
                )
            }),
        )
        .route(
            "/api/v1/discover/movies",
            get(|| async { Json(json!({"page": 1, "results": [{"id": 603, "title": "The Matrix"}]})) }),
        )
        .route(
            "/api/v1/discover/tv",
            get(|| async { Json(json!({"page": 1, "results": [{"id": 1399, "name": "Game of Thrones"}]})) }),
        )
        .route(
            "/api/v1/request",
            get(|| async {
                Json(json!({
                    "pageInfo": {"pages": 1},
                    "results": [
                        {"id": 10, "type": "tv", "media": {"id": 4, "tmdbId": 1399, "mediaType": "tv"}},
                        {"id": 11, "type": "movie", "media": {"id": 5}},
                        {"id": 12}
                    ]
                }))
            }),
        )
        .route(
            "/api/v1/movie/:id",
            get(|Path(id): Path<u64>| async move { Json(json!({"id": id, "title": "Fight Club"})) }),
        )
        .route(
            "/api/v1/tv/:id",
            get(|Path(id): Path<u64>| async move { Json(json!({"id": id, "name": "Game of Thrones"})) }),
        )
}

#[tokio::test]
async fn discover_tolerates_a_failing_branch() {
    let base = spawn_upstream(dashboard_mock()).await;
    let app = build_router(test_client());

    let (status, _, body) = call(&app, "GET", "/discover", &[("x-seerr-url", &base)], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["trending"], Value::Null);
    assert_eq!(
        body["recent"]["results"],
        json!([{"id": 550, "tmdbId": 550, "mediaType": "movie", "status": 5, "title": "Fight Club"}])
    );
    assert_eq!(
        body["popularMovies"]["results"],
        json!([{"id": 603, "tmdbId": 603, "mediaType": "movie", "title": "The Matrix"}])
    );
    assert_eq!(
        body["popularTv"]["results"],
        json!([{"id": 1399, "tmdbId": 1399, "mediaType": "tv", "name": "Game of Thrones"}])
    );
    assert_eq!(
        body["recentRequests"]["results"][0]["mediaMetadata"],
        json!({"id": 1399, "name": "Game of Thrones", "mediaType": "tv"})
    );

    let keys: Vec<&String> = body.as_object().unwrap().keys().collect();
    assert_eq!(keys.len(), 5);
}

#[tokio::test]
async fn trending_failure_surfaces_on_its_own_route() {
    let base = spawn_upstream(dashboard_mock()).await;
    let app = build_router(test_client());

    let (status, _, body) = call(&app, "GET", "/trending", &[("x-seerr-url", &base)], None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"message": "Unable to retrieve trending items."}));
}

#[tokio::test]
async fn recent_requests_attach_media_metadata_when_resolvable() {
    let base = spawn_upstream(dashboard_mock()).await;
    let app = build_router(test_client());

    let (status, _, body) =
        call(&app, "GET", "/recent-requests", &[("x-seerr-url", &base)], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pageInfo"], json!({"pages": 1}));
    assert_eq!(
        body["results"],
        json!([
            {
                "id": 10,
                "type": "tv",
                "media": {"id": 4, "tmdbId": 1399, "mediaType": "tv"},
                "mediaMetadata": {"id": 1399, "name": "Game of Thrones", "mediaType": "tv"}
            },
            {"id": 11, "type": "movie", "media": {"id": 5}},
            {"id": 12}
        ])
    );
}

#[tokio::test]
async fn discover_with_unreachable_upstream_is_all_null() {
    let base = closed_base_url().await;
    let app = build_router(test_client());

    let (status, _, body) = call(&app, "GET", "/discover", &[("x-seerr-url", &base)], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "recent": null,
            "trending": null,
            "popularMovies": null,
            "popularTv": null,
            "recentRequests": null
        })
    );
}

#[tokio::test]
async fn hydration_preserves_order_and_degrades_per_item() {
    let upstream = Router::new().route(
        "/api/v1/movie/:id",
        get(|Path(id): Path<u64>| async move {
            match id {
                1 => {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    (StatusCode::OK, Json(json!({"title": "One"})))
                }
                2 => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"message": "boom"})),
                ),
                _ => (StatusCode::OK, Json(json!({"title": "Three"}))),
            }
        }),
    );
    let base = spawn_upstream(upstream).await;
    let client = test_client();
    let creds = crate::seerr::upstream::Credentials {
        base_url: Some(base),
        ..Default::default()
    };

    let raw = json!([{"id": 1}, {"id": 2}, {"id": 3}, {"title": "No id"}]);
    let out = crate::seerr::media::hydrate_items(
        &client,
        &creds,
        &raw,
        crate::seerr::media::MediaKind::Movie,
    )
    .await;

    assert_eq!(
        out,
        vec![
            json!({"id": 1, "tmdbId": 1, "mediaType": "movie", "title": "One"}),
            json!({"id": 2, "tmdbId": 2, "mediaType": "movie"}),
            json!({"id": 3, "tmdbId": 3, "mediaType": "movie", "title": "Three"}),
            json!({"title": "No id", "mediaType": "movie"}),
        ]
    );
}

#[tokio::test]
async fn hydration_of_empty_or_missing_lists() {
    let client = test_client();
    let creds = crate::seerr::upstream::Credentials {
        base_url: Some(closed_base_url().await),
        ..Default::default()
    };
    let out = crate::seerr::media::hydrate_items(
        &client,
        &creds,
        &json!([]),
        crate::seerr::media::MediaKind::Tv,
    )
    .await;
    assert!(out.is_empty());

    let out = crate::seerr::media::hydrate_requests(&client, &creds, &Value::Null).await;
    assert!(out.is_empty());
}
