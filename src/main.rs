fn main() {
    maine_films_lib::run()
}
