//! Built-in storefront resource catalog.
//!
//! These are the resource types exposed through the generic CRUD surface.
//! Adding a resource here is all it takes to serve it; resources without
//! relations are simply returned unexpanded.

use crate::registry::{RegistryError, SchemaRegistry};
use crate::schema::ResourceSchema;

/// Build the registry of all storefront resources.
pub fn storefront_catalog() -> Result<SchemaRegistry, RegistryError> {
    SchemaRegistry::builder()
        .register(
            ResourceSchema::new("users")
                .searchable(&["name", "email", "phone"])
                .sortable(&["name", "email"])
                .filterable(&["role", "isActive"]),
        )
        .register(
            ResourceSchema::new("categories")
                .searchable(&["name", "slug"])
                .sortable(&["name", "position"])
                .filterable(&["isActive"])
                .relation("parent", "categories"),
        )
        .register(
            ResourceSchema::new("brands")
                .searchable(&["name"])
                .sortable(&["name"]),
        )
        .register(
            ResourceSchema::new("products")
                .searchable(&["name", "description", "sku"])
                .sortable(&["name", "price", "stock", "sold", "rating"])
                .filterable(&["status", "isFeatured", "kind"])
                .relation("category", "categories")
                .relation("brand", "brands"),
        )
        .register(
            // Product variants share one collection; `kind` discriminates the
            // per-type attribute sets (apparel sizes, device storage, ...).
            ResourceSchema::new("variants")
                .searchable(&["sku", "color", "size"])
                .sortable(&["price", "stock"])
                .filterable(&["kind", "isActive"])
                .relation("product", "products"),
        )
        .register(
            ResourceSchema::new("vouchers")
                .searchable(&["code", "description"])
                .sortable(&["code", "discount", "expiresAt"])
                .filterable(&["isActive", "type"]),
        )
        .register(
            ResourceSchema::new("orders")
                .searchable(&["code", "note", "phone"])
                .sortable(&["total", "status"])
                .filterable(&["status", "paymentStatus"])
                .relation("user", "users")
                .relation("voucher", "vouchers")
                .relation("products", "products"),
        )
        .register(
            ResourceSchema::new("payments")
                .searchable(&["transactionId"])
                .sortable(&["amount", "status"])
                .filterable(&["status", "method"])
                .relation("order", "orders")
                .relation("user", "users"),
        )
        .register(
            ResourceSchema::new("shipments")
                .searchable(&["trackingNumber", "carrier"])
                .sortable(&["status", "estimatedAt"])
                .filterable(&["status"])
                .relation("order", "orders"),
        )
        .register(
            ResourceSchema::new("comments")
                .searchable(&["content"])
                .sortable(&["rating"])
                .filterable(&["isApproved"])
                .relation("product", "products")
                .relation("user", "users"),
        )
        .register(
            ResourceSchema::new("favorites")
                .relation("user", "users")
                .relation("products", "products"),
        )
        .register(
            ResourceSchema::new("carts")
                .sortable(&["updatedAt"])
                .relation("user", "users")
                .relation("products", "products"),
        )
        .register(
            ResourceSchema::new("addresses")
                .searchable(&["city", "street", "recipient"])
                .sortable(&["city"])
                .filterable(&["isDefault"])
                .relation("user", "users"),
        )
        .register(
            ResourceSchema::new("banners")
                .searchable(&["title"])
                .sortable(&["position", "title"])
                .filterable(&["isActive", "placement"]),
        )
        .register(
            ResourceSchema::new("notifications")
                .searchable(&["title", "message"])
                .filterable(&["isRead", "type"])
                .relation("user", "users"),
        )
        .build()
}
