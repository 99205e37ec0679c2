mod common;

use actix_web::test;
use serde_json::json;
use serial_test::serial;

use stayhub_api::models::user::UserRole;

use common::{body_json, date, identity, TestApp, GUEST_ID, HOST_ID};

#[actix_rt::test]
#[serial]
async fn test_create_booking_prices_the_stay() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;
    let property = test_app.seed_property().await;

    let req = test::TestRequest::post()
        .uri(&format!("/api/properties/{}/bookings", property.id))
        .insert_header(test_app.guest())
        .set_json(json!({
            "startDate": "2030-06-01",
            "endDate": "2030-06-07",
            "guests": 2,
            "paymentMethod": "eft"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);

    let body = body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["totalPrice"], 1200.0);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["paymentStatus"], "pending");
    assert_eq!(body["data"]["user"], GUEST_ID);
}

#[actix_rt::test]
#[serial]
async fn test_create_booking_requires_auth() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;
    let property = test_app.seed_property().await;

    let req = test::TestRequest::post()
        .uri(&format!("/api/properties/{}/bookings", property.id))
        .set_json(json!({
            "startDate": "2030-06-01",
            "endDate": "2030-06-07",
            "paymentMethod": "cash"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
    assert_eq!(body_json(resp).await["success"], false);
}

#[actix_rt::test]
#[serial]
async fn test_overlapping_booking_is_rejected() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;
    let property = test_app.seed_property().await;
    let existing = test_app
        .seed_booking(&property.id, "2030-06-01", "2030-06-07")
        .await;
    test_app
        .state
        .bookings
        .confirm(&existing.id, &identity(HOST_ID, UserRole::Owner))
        .await
        .unwrap();

    let req = test::TestRequest::post()
        .uri(&format!("/api/properties/{}/bookings", property.id))
        .insert_header(test_app.guest())
        .set_json(json!({
            "startDate": "2030-06-05",
            "endDate": "2030-06-10",
            "paymentMethod": "eft"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body = body_json(resp).await;
    assert_eq!(
        body["error"],
        "Property is not available for the selected dates"
    );

    // checking out and checking in on the same day is fine
    let req = test::TestRequest::post()
        .uri(&format!("/api/properties/{}/bookings", property.id))
        .insert_header(test_app.guest())
        .set_json(json!({
            "startDate": "2030-06-07",
            "endDate": "2030-06-10",
            "paymentMethod": "eft"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
}

#[actix_rt::test]
#[serial]
async fn test_inverted_dates_are_a_validation_error() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;
    let property = test_app.seed_property().await;

    let req = test::TestRequest::post()
        .uri(&format!("/api/properties/{}/bookings", property.id))
        .insert_header(test_app.guest())
        .set_json(json!({
            "startDate": "2030-06-07",
            "endDate": "2030-06-07",
            "paymentMethod": "eft"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    assert!(test_app.store.claimed_nights(&property.id).is_empty());
}

#[actix_rt::test]
#[serial]
async fn test_century_long_stay_is_rejected() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;
    let property = test_app.seed_property().await;

    let req = test::TestRequest::post()
        .uri(&format!("/api/properties/{}/bookings", property.id))
        .insert_header(test_app.guest())
        .set_json(json!({
            "startDate": "2030-01-01",
            "endDate": "2130-01-01",
            "paymentMethod": "eft"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    assert!(body_json(resp).await["error"]
        .as_str()
        .unwrap()
        .contains("365 nights"));
    assert!(test_app.store.claimed_nights(&property.id).is_empty());
}

#[actix_rt::test]
#[serial]
async fn test_availability_follows_the_booking_lifecycle() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;
    let property = test_app.seed_property().await;
    let uri = format!(
        "/api/properties/{}/availability?startDate=2030-06-01&endDate=2030-06-07",
        property.id
    );

    let resp = test::call_service(&app, test::TestRequest::get().uri(&uri).to_request()).await;
    assert_eq!(resp.status(), 200);
    let body = body_json(resp).await;
    assert_eq!(body["data"]["available"], true);
    assert_eq!(body["data"]["nights"], 6);
    assert_eq!(body["data"]["totalPrice"], 1200.0);

    let booking = test_app
        .seed_booking(&property.id, "2030-06-01", "2030-06-07")
        .await;
    let resp = test::call_service(&app, test::TestRequest::get().uri(&uri).to_request()).await;
    assert_eq!(body_json(resp).await["data"]["available"], false);

    let req = test::TestRequest::put()
        .uri(&format!("/api/bookings/{}/cancel", booking.id))
        .insert_header(test_app.guest())
        .set_json(json!({ "reason": "Change of plans" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body = body_json(resp).await;
    assert_eq!(body["data"]["status"], "cancelled");
    assert_eq!(body["data"]["cancellation"]["reason"], "Change of plans");

    let resp = test::call_service(&app, test::TestRequest::get().uri(&uri).to_request()).await;
    assert_eq!(body_json(resp).await["data"]["available"], true);
}

#[actix_rt::test]
#[serial]
async fn test_availability_rejects_malformed_dates() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;
    let property = test_app.seed_property().await;

    let req = test::TestRequest::get()
        .uri(&format!(
            "/api/properties/{}/availability?startDate=soon&endDate=2030-06-07",
            property.id
        ))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_rt::test]
#[serial]
async fn test_update_booking_to_its_own_dates() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;
    let property = test_app.seed_property().await;
    let booking = test_app
        .seed_booking(&property.id, "2030-06-01", "2030-06-07")
        .await;

    let req = test::TestRequest::put()
        .uri(&format!("/api/bookings/{}", booking.id))
        .insert_header(test_app.guest())
        .set_json(json!({
            "startDate": "2030-06-01",
            "endDate": "2030-06-07",
            "guests": 3
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body = body_json(resp).await;
    assert_eq!(body["data"]["guests"], 3);
    assert_eq!(body["data"]["totalPrice"], 1200.0);

    // extending reprices and claims the extra night
    let req = test::TestRequest::put()
        .uri(&format!("/api/bookings/{}", booking.id))
        .insert_header(test_app.guest())
        .set_json(json!({ "endDate": "2030-06-08" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(body_json(resp).await["data"]["totalPrice"], 1400.0);
    assert_eq!(test_app.store.claimed_nights(&property.id).len(), 7);
}

#[actix_rt::test]
#[serial]
async fn test_update_into_another_booking_is_rejected() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;
    let property = test_app.seed_property().await;
    test_app
        .seed_booking(&property.id, "2030-06-10", "2030-06-15")
        .await;
    let booking = test_app
        .seed_booking(&property.id, "2030-06-01", "2030-06-07")
        .await;

    let req = test::TestRequest::put()
        .uri(&format!("/api/bookings/{}", booking.id))
        .insert_header(test_app.guest())
        .set_json(json!({ "endDate": "2030-06-12" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let stored = test_app
        .state
        .bookings
        .get(&booking.id, &identity(GUEST_ID, UserRole::User))
        .await
        .unwrap();
    assert_eq!(stored.end_date, date("2030-06-07"));
}

#[actix_rt::test]
#[serial]
async fn test_status_lifecycle_through_the_api() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;
    let property = test_app.seed_property().await;
    let booking = test_app
        .seed_booking(&property.id, "2030-06-01", "2030-06-07")
        .await;

    let put = |action: &str| {
        test::TestRequest::put()
            .uri(&format!("/api/bookings/{}/{}", booking.id, action))
            .insert_header(test_app.host())
            .to_request()
    };

    let resp = test::call_service(&app, put("checkin")).await;
    assert_eq!(resp.status(), 400);
    let body = body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("pending"));

    let resp = test::call_service(&app, put("confirm")).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(body_json(resp).await["data"]["status"], "confirmed");

    let resp = test::call_service(&app, put("checkin")).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(body_json(resp).await["data"]["status"], "checked_in");

    let resp = test::call_service(&app, put("checkout")).await;
    assert_eq!(resp.status(), 200);
    let body = body_json(resp).await;
    assert_eq!(body["data"]["status"], "completed");
    assert!(body["data"]["checkedOutAt"].is_string());

    // a checked-out stay cannot be cancelled
    let req = test::TestRequest::put()
        .uri(&format!("/api/bookings/{}/cancel", booking.id))
        .insert_header(test_app.guest())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_rt::test]
#[serial]
async fn test_guest_cannot_confirm_own_booking() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;
    let property = test_app.seed_property().await;
    let booking = test_app
        .seed_booking(&property.id, "2030-06-01", "2030-06-07")
        .await;

    let req = test::TestRequest::put()
        .uri(&format!("/api/bookings/{}/confirm", booking.id))
        .insert_header(test_app.guest())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);
}

#[actix_rt::test]
#[serial]
async fn test_booking_visibility() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;
    let property = test_app.seed_property().await;
    let booking = test_app
        .seed_booking(&property.id, "2030-06-01", "2030-06-07")
        .await;

    let stranger = test_app.bearer("stranger", UserRole::User);
    let req = test::TestRequest::get()
        .uri(&format!("/api/bookings/{}", booking.id))
        .insert_header(stranger.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);

    let req = test::TestRequest::get()
        .uri("/api/bookings")
        .insert_header(stranger)
        .to_request();
    let body = body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["count"], 0);

    for who in [test_app.guest(), test_app.host(), test_app.admin()] {
        let req = test::TestRequest::get()
            .uri("/api/bookings")
            .insert_header(who)
            .to_request();
        let body = body_json(test::call_service(&app, req).await).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["data"][0]["_id"], booking.id.as_str());
    }
}

#[actix_rt::test]
#[serial]
async fn test_late_cancellation_is_refused() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;
    let property = test_app.seed_property().await;
    let tomorrow = chrono::Utc::now().date_naive() + chrono::Duration::days(1);
    let after = tomorrow + chrono::Duration::days(2);
    let booking = test_app
        .seed_booking(
            &property.id,
            &tomorrow.format("%Y-%m-%d").to_string(),
            &after.format("%Y-%m-%d").to_string(),
        )
        .await;

    let req = test::TestRequest::put()
        .uri(&format!("/api/bookings/{}/cancel", booking.id))
        .insert_header(test_app.guest())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let req = test::TestRequest::put()
        .uri(&format!("/api/bookings/{}/cancel", booking.id))
        .insert_header(test_app.admin())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
}

#[actix_rt::test]
#[serial]
async fn test_delete_booking_frees_dates() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;
    let property = test_app.seed_property().await;
    let booking = test_app
        .seed_booking(&property.id, "2030-06-01", "2030-06-07")
        .await;

    let req = test::TestRequest::delete()
        .uri(&format!("/api/bookings/{}", booking.id))
        .insert_header(test_app.guest())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert!(test_app.store.claimed_nights(&property.id).is_empty());

    let req = test::TestRequest::get()
        .uri(&format!("/api/bookings/{}", booking.id))
        .insert_header(test_app.guest())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}
