use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{ForgotPasswordRequest, LoginRequest, LoginResponse, RegisterRequest, ResetPasswordRequest},
        cart::{AddToCartRequest, CartView, UpdateCartItemRequest},
        orders::{
            GatewayCheckout, OrderList, OrderWithItems, PlaceOrderRequest, PlaceOrderResponse,
            UpdateOrderStatusRequest,
        },
        payment::VerifyPaymentRequest,
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        reviews::{ReviewList, ReviewRequest, ReviewWithProduct},
    },
    entity::orders::{OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress},
    models::{CartLine, Order, OrderItem, PaymentInfo, Product, Review, ShippingMethod, User},
    payment::GatewayIntent,
    response::{ApiResponse, Meta},
    routes::{auth, cart, health, orders, params, payment, products, reviews},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::forgot_password,
        auth::reset_password,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        cart::get_cart,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_from_cart,
        cart::clear_cart,
        orders::place_order,
        orders::list_my_orders,
        orders::list_all_orders,
        orders::get_order,
        orders::update_order_status,
        orders::cancel_order,
        payment::verify_payment,
        reviews::list_reviews,
        reviews::submit_review,
        reviews::delete_review
    ),
    components(
        schemas(
            User,
            Product,
            CartLine,
            ShippingMethod,
            ShippingAddress,
            PaymentInfo,
            Order,
            OrderItem,
            Review,
            OrderStatus,
            PaymentStatus,
            PaymentMethod,
            GatewayIntent,
            GatewayCheckout,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            ForgotPasswordRequest,
            ResetPasswordRequest,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            AddToCartRequest,
            UpdateCartItemRequest,
            CartView,
            PlaceOrderRequest,
            PlaceOrderResponse,
            UpdateOrderStatusRequest,
            OrderWithItems,
            OrderList,
            VerifyPaymentRequest,
            ReviewRequest,
            ReviewWithProduct,
            ReviewList,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartView>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<PlaceOrderResponse>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Products", description = "Product endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Payment", description = "Payment verification"),
        (name = "Reviews", description = "Product review endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
