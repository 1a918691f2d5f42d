use foodrec::als::AlsParams;
use foodrec::source::{dish_id_for, Order, OrderLine, Restaurant};
use foodrec::{OrderLog, Settings};

pub fn restaurant(restaurant_id: i64, name: &str) -> Restaurant {
    Restaurant {
        restaurant_id,
        restaurant_name: name.to_string(),
    }
}

pub fn order(order_id: i64, customer: &str, restaurant_id: i64, placed_at: i64) -> Order {
    let (dish, qty) = match restaurant_id {
        1 => ("Biryani", 1),
        2 => ("Penne", 2),
        _ => ("Masala Dosa", 1),
    };
    Order {
        order_id,
        customer_id: customer.to_string(),
        restaurant_id,
        placed_at,
        items: vec![OrderLine {
            dish_id: dish_id_for(restaurant_id, dish),
            dish_name: dish.to_string(),
            qty,
        }],
    }
}

/// Training partition for restaurants is [[3, 1], [2, 0]] over users [c1, c2] and
/// restaurants [1, 2]. `c3` has a single order, which is held out.
pub fn sample_log() -> OrderLog {
    let restaurants = vec![
        restaurant(1, "Biryani Point"),
        restaurant(2, "Pasta Corner"),
        restaurant(3, "Dosa Hut"),
    ];
    let orders = vec![
        order(1, "c1", 1, 100),
        order(2, "c1", 1, 110),
        order(3, "c1", 1, 120),
        order(4, "c1", 2, 130),
        order(5, "c1", 1, 200),
        order(6, "c2", 1, 100),
        order(7, "c2", 1, 110),
        order(8, "c2", 2, 300),
        order(9, "c3", 3, 50),
    ];
    OrderLog::new(restaurants, orders)
}

/// Same customers and restaurants, but no order lines.
pub fn log_without_dishes() -> OrderLog {
    let log = sample_log();
    let orders = log
        .orders()
        .iter()
        .cloned()
        .map(|o| Order {
            items: Vec::new(),
            ..o
        })
        .collect();
    OrderLog::new(log.restaurants().to_vec(), orders)
}

pub fn settings(artifacts_dir: &std::path::Path) -> Settings {
    Settings {
        artifacts_dir: artifacts_dir.to_path_buf(),
        als: AlsParams {
            factors: 1,
            iterations: 15,
            ..AlsParams::default()
        },
        ..Settings::default()
    }
}
