//! Resource controller example: a users endpoint behind plain HTML forms.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example restful
//!
//! Try:
//!   curl http://localhost:3000/users
//!   curl -X POST http://localhost:3000/users
//!   curl -X POST 'http://localhost:3000/users?_method=DELETE'
//!   curl -X POST http://localhost:3000/users -d '_method=PUT' \
//!        -H 'content-type: application/x-www-form-urlencoded'
//!   curl -X PATCH http://localhost:3000/users           # 404, not implemented
//!   curl -H 'host: admin.localhost' http://localhost:3000/

use std::sync::Arc;

use stile::controller::{self, Controller, MethodHandlerSet};
use stile::middleware::{SetHeader, Trace};
use stile::{Application, BoxedHandler, BoxedMiddleware, Context, Server, health};

const INDEX: &str = r#"<html>
<body>
  <h3>RESTful controller example</h3>
  <form method="post" action="/users"><button>POST</button></form>
  <form method="post" action="/users?_method=PUT"><button>PUT</button></form>
  <form method="post" action="/users?_method=DELETE"><button>DELETE</button></form>
  <form method="post" action="/users?_method=PATCH"><button>PATCH (404)</button></form>
</body>
</html>"#;

struct Users {
    middlewares: Vec<BoxedMiddleware>,
}

impl MethodHandlerSet for Users {
    fn get(&self, ctx: &mut Context) {
        ctx.json(&serde_json::json!([{ "id": 1, "name": "alice" }]));
    }

    fn post(&self, ctx: &mut Context) {
        ctx.json_with_code(201, &serde_json::json!({ "id": 2 }));
    }

    fn put(&self, ctx: &mut Context) {
        ctx.text("PUT handler of users");
    }

    fn delete(&self, ctx: &mut Context) {
        ctx.text("DELETE handler of users");
    }
}

impl Controller for Users {
    fn middlewares(&self) -> Vec<BoxedMiddleware> {
        self.middlewares.clone()
    }

    fn wrap(self: Arc<Self>, next: BoxedHandler) -> BoxedHandler {
        controller::method_override(self, next)
    }
}

fn index(ctx: &mut Context) {
    ctx.html(INDEX);
}

#[tokio::main]
async fn main() -> Result<(), stile::Error> {
    tracing_subscriber::fmt::init();

    let mut app = Application::new();

    app.new_router("")
        .add_middleware(Trace)
        .get("/", index)?
        .get("/healthz", health::liveness)?
        .get("/readyz", health::readiness)?
        .register_controller("/users", Users {
            middlewares: vec![
                Arc::new(SetHeader::from_static("access-control-allow-origin", "*")),
                Arc::new(SetHeader::from_static("access-control-allow-methods", "GET, POST, DELETE, PUT")),
            ],
        })?;

    app.new_router("admin.localhost")
        .add_middleware(Trace)
        .get("/", |ctx: &mut Context| ctx.text("admin"))?;

    Server::bind("0.0.0.0:3000")?.serve(app).await
}
